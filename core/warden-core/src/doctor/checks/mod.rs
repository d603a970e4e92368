mod checkpoint;
mod crew_state;
mod identity;
mod orphan;
mod orphan_process;
mod zombie;

pub use checkpoint::CheckpointCheck;
pub use crew_state::CrewStateCheck;
pub use identity::IdentityCollisionCheck;
pub use orphan::OrphanSessionCheck;
pub use orphan_process::OrphanProcessCheck;
pub use zombie::ZombieSessionCheck;
