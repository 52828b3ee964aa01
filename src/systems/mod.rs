pub mod crime;
pub mod decay;
pub mod demand;
pub mod economy;
pub mod fire;
pub mod growth;
pub mod land_value;
pub mod power;

pub use crime::CrimeSystem;
pub use decay::{building_status, BuildingStatus, DecaySystem};
pub use demand::{Demand, DemandSystem, ZoneCensus};
pub use economy::EconomySystem;
pub use fire::FireSystem;
pub use growth::GrowthSystem;
pub use land_value::LandValueSystem;
pub use power::PowerSystem;
