//! Relational aggregation and synchronization core shared by the repositories.

pub mod association;
pub mod delimited;
pub mod guard;
pub mod partial_update;
pub mod reconstruct;
pub mod unit_of_work;

pub use association::{synchronize, AssociationDiff, LinkOp, LinkTable};
pub use delimited::{parse_children, read_children, split_names};
pub use guard::{exists, ExistenceGuard};
pub use partial_update::PartialUpdate;
pub use reconstruct::{reconstruct, reconstruct_one, AggregateMapper};
pub use unit_of_work::{ActiveUnit, GuardedUnit, UnitOfWork, UnitState};
