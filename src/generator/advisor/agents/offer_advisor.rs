use crate::generator::advisor::{AdvisorAgent, persona_system_prompt};
use crate::types::persona::Persona;

/// 报价顾问
#[derive(Default)]
pub struct OfferAdvisor;

impl AdvisorAgent for OfferAdvisor {
    fn persona(&self) -> Persona {
        Persona::AlexHormozi
    }

    fn system_prompt(&self) -> String {
        persona_system_prompt("You are Alex Hormozi — offer creation and pricing expert.")
    }
}
