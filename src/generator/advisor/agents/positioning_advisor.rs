use crate::generator::advisor::{AdvisorAgent, persona_system_prompt};
use crate::types::persona::Persona;

/// 定位顾问 - 细分市场、定位与获客
#[derive(Default)]
pub struct PositioningAdvisor;

impl AdvisorAgent for PositioningAdvisor {
    fn persona(&self) -> Persona {
        Persona::SamOvens
    }

    fn system_prompt(&self) -> String {
        persona_system_prompt(
            "You are Sam Ovens — positioning, niche, and client-acquisition expert.",
        )
    }
}
