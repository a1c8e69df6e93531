/// Type-state markers for the builder pattern
///
/// These types are used to track which fields have been set
/// in the builder at compile-time, preventing invalid configurations.

use std::marker::PhantomData;

/// Marker trait for endpoint state
pub trait EndpointState {}

/// Endpoint has not been set
pub struct NoEndpoint;
impl EndpointState for NoEndpoint {}

/// Endpoint has been set
pub struct HasEndpoint;
impl EndpointState for HasEndpoint {}

/// Marker trait for transport factory state
pub trait TransportState {}

/// Transport factory has not been set
pub struct NoTransport;
impl TransportState for NoTransport {}

/// Transport factory has been set
pub struct HasTransport;
impl TransportState for HasTransport {}

/// Phantom marker to prevent direct construction
#[derive(Debug, Clone, Copy)]
pub struct TypeState<E, T> {
    _endpoint: PhantomData<E>,
    _transport: PhantomData<T>,
}

impl<E, T> TypeState<E, T> {
    pub(crate) fn new() -> Self {
        Self {
            _endpoint: PhantomData,
            _transport: PhantomData,
        }
    }
}

impl<E, T> Default for TypeState<E, T> {
    fn default() -> Self {
        Self::new()
    }
}
