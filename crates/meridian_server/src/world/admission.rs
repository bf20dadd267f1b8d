//! World capacity check for joining connections.

use crate::connection::Connection;

/// Decides whether a waiting connection may join.
pub trait AdmissionPolicy: Send + Sync {
    /// `online` is the number of observers already joined, including those
    /// admitted earlier in the same phase.
    fn admit(&self, online: usize, connection: &dyn Connection) -> bool;
}

/// Admits until a fixed number of observers is online.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaxObservers(pub usize);

impl AdmissionPolicy for MaxObservers {
    fn admit(&self, online: usize, _connection: &dyn Connection) -> bool {
        online < self.0
    }
}

impl<F> AdmissionPolicy for F
where
    F: Fn(usize, &dyn Connection) -> bool + Send + Sync,
{
    fn admit(&self, online: usize, connection: &dyn Connection) -> bool {
        self(online, connection)
    }
}
