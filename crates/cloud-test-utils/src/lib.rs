//! # Cloud Test Utilities
//!
//! In-memory stand-ins for the cloud services the cloudcheck scenarios
//! drive, so workflows can be tested without a cloud.
//!
//! ## Modules
//!
//! - `mock_identity` - Identity service (v2 tenants and v3 projects/domains)
//! - `mock_compute` - Compute service with scripted server status progressions
//! - `mock_network` - Floating IP allocation
//! - `mock_volume` - Block storage
//! - `mock_remote` - Remote command execution with an in-memory guest filesystem
//! - `harness` - Builds a `ScenarioContext` wired to the mocks
//! - `test_ids` - Fixed names and ids
//!
//! All mocks share a [`CallLog`] when built through the harness, so tests can
//! assert ordering across services (e.g. cleanup in reverse creation order).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cloud_test_utils::*;
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_example() {
//!     let harness = TestContextBuilder::new()
//!         .with_compute(MockCompute::new().with_shelve_mode(ShelveMode::Manual))
//!         .configure(|c| c.compute.shelved_offload_time = -1)
//!         .build();
//!
//!     let report = ShelveScenario::image_backed()
//!         .run(harness.ctx)
//!         .await?
//!         .completed()
//!         .unwrap();
//!
//!     assert_eq!(harness.mocks.compute.call_count("shelve_offload_server"), 1);
//! }
//! ```

pub mod call_log;
pub mod harness;
pub mod mock_compute;
pub mod mock_identity;
pub mod mock_network;
pub mod mock_remote;
pub mod mock_volume;
pub mod test_ids;

// Re-export commonly used items
pub use call_log::*;
pub use harness::*;
pub use mock_compute::*;
pub use mock_identity::*;
pub use mock_network::*;
pub use mock_remote::*;
pub use mock_volume::*;
pub use test_ids::*;
