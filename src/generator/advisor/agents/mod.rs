pub mod offer_advisor;
pub mod operations_advisor;
pub mod positioning_advisor;
