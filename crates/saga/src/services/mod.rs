//! Collaborator service traits, HTTP clients and in-memory implementations.

pub mod catalog;
pub mod reservation;

pub use catalog::{CatalogService, HttpCatalogClient, InMemoryCatalogService, PriceQuote};
pub use reservation::{
    HttpReservationClient, InMemoryReservationService, ReservationPathOrder, ReservationService,
};
