use thiserror::Error;

use super::host::{NodeId, ObserverId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
	#[error("node not found: {0}")]
	NodeNotFound(NodeId),
	#[error("observer not found: {0}")]
	ObserverNotFound(ObserverId),
	#[error("node {child} is not a child of {parent}")]
	NotAChild { parent: NodeId, child: NodeId },
	#[error("inserting {child} under {parent} would create a cycle")]
	HierarchyRequest { parent: NodeId, child: NodeId },
}
