//! Scenaria Parameter Distribution Engine
//!
//! Deterministically enumerates combinations of scenario parameters so a
//! single abstract scenario can be replayed many times with varying
//! initial conditions.
//!
//! The engine models the distribution elements of a scenario file as a
//! tree of heterogeneous node kinds (discrete sets, stepped numeric
//! ranges, externally computed sequences, and lists of whole parameter
//! tuples) exposed as one lazily-advancing, order-preserving sequence:
//! sub-sequences are exhausted before their parent advances, and an
//! exhausted node never wraps.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use scenaria_core::{
//!     Deterministic, DeterministicParameterDistribution, DistributionDefinition,
//!     DistributionRange, ParameterValueDistribution, Scope, SingleParameterDistribution,
//!     SingleParameterKind,
//! };
//!
//! let member = DeterministicParameterDistribution::Single(SingleParameterDistribution::new(
//!     "initial_speed",
//!     SingleParameterKind::Range(DistributionRange::new(0.0, 10.0, 5.0).unwrap()),
//! ));
//! let mut driver = ParameterValueDistribution::new(
//!     "cut_in.xosc",
//!     DistributionDefinition::deterministic(Deterministic::new(vec![member])),
//! );
//!
//! let global = Arc::new(Scope::new());
//! let runs = driver.run(&global, |scope| {
//!     // one scenario execution per sampled scope
//!     assert!(scope.lookup("initial_speed").is_some());
//!     Ok(())
//! }).unwrap();
//! assert_eq!(runs, 3);
//! ```

mod distribution;
mod driver;
mod scope;

pub use distribution::{
    Deterministic, DeterministicParameterDistribution, DistributionDefinition, DistributionRange,
    DistributionSet, Generator, GeneratorRegistry, MultiParameterDistribution, ParameterValueSet,
    SampleTuple, SingleParameterDistribution, SingleParameterKind, UserDefinedDistribution,
    ValueSetDistribution,
};
pub use driver::ParameterValueDistribution;
pub use scope::{ParameterValue, Scope};
