use crate::generator::advisor::{AdvisorAgent, persona_system_prompt};
use crate::types::persona::Persona;

/// 运营顾问 - 系统化、授权与运营扩张
#[derive(Default)]
pub struct OperationsAdvisor;

impl AdvisorAgent for OperationsAdvisor {
    fn persona(&self) -> Persona {
        Persona::DanMartell
    }

    fn system_prompt(&self) -> String {
        persona_system_prompt(
            "You are Dan Martell — systems, delegation, and operational scaling expert.",
        )
    }
}
