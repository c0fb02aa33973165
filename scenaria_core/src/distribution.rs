//! Deterministic parameter distribution nodes.
//!
//! Each node kind pairs an immutable domain description (taken from an
//! already-validated scenario syntax node) with one explicit cursor.
//! `sample` advances the cursor exactly once per call and, once the
//! cursor passes the end of the domain, every subsequent call returns
//! `None`. A distribution never wraps or resets.
//!
//! Stochastic distributions are unsupported and fail at construction
//! rather than silently approximating.

use std::collections::HashMap;

use tracing::debug;

use crate::scope::{ParameterValue, Scope};
use scenaria_env::SimError;

/// One fully-formed name→value assignment tuple.
pub type SampleTuple = Vec<(String, ParameterValue)>;

/// External generator callback for user-defined distributions. Receives
/// the distribution's content string; returns `None` once exhausted.
pub type Generator = Box<dyn FnMut(&str) -> Option<ParameterValue>>;

/// Registry of user-defined sample generators, keyed by type tag.
#[derive(Default)]
pub struct GeneratorRegistry {
    generators: HashMap<String, Generator>,
}

impl GeneratorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a generator under a type tag.
    pub fn register(
        &mut self,
        type_tag: impl Into<String>,
        generator: impl FnMut(&str) -> Option<ParameterValue> + 'static,
    ) {
        self.generators.insert(type_tag.into(), Box::new(generator));
    }

    /// Draws a sample from the named generator. An unregistered tag is
    /// treated as an exhausted source, never an error.
    fn sample(&mut self, type_tag: &str, content: &str) -> Option<ParameterValue> {
        match self.generators.get_mut(type_tag) {
            Some(generator) => generator(content),
            None => None,
        }
    }
}

/// A finite ordered list of literal values, consumed in document order.
#[derive(Debug, Clone)]
pub struct DistributionSet {
    elements: Vec<ParameterValue>,
    cursor: usize,
}

impl DistributionSet {
    /// Creates a set distribution. At least one element is required.
    pub fn new(elements: Vec<ParameterValue>) -> Result<Self, SimError> {
        if elements.is_empty() {
            return Err(SimError::configuration(
                "DistributionSet requires at least one element",
            ));
        }
        Ok(Self {
            elements,
            cursor: 0,
        })
    }

    /// Next literal value in list order, each consumed exactly once.
    pub fn sample(&mut self) -> Option<ParameterValue> {
        let value = self.elements.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(value)
    }
}

/// A stepped numeric range: lowerLimit, lowerLimit + stepWidth, … while
/// the current value does not exceed upperLimit.
#[derive(Debug, Clone)]
pub struct DistributionRange {
    lower_limit: f64,
    upper_limit: f64,
    step_width: f64,
    current: f64,
}

impl DistributionRange {
    /// Creates a range distribution.
    ///
    /// A non-positive step over a non-empty interval would never
    /// terminate, so it is rejected as a configuration error. An empty
    /// interval (`lower > upper`) constructs fine and is exhausted from
    /// the first sample.
    pub fn new(lower_limit: f64, upper_limit: f64, step_width: f64) -> Result<Self, SimError> {
        if lower_limit <= upper_limit && step_width <= 0.0 {
            return Err(SimError::configuration(format!(
                "DistributionRange step width must be positive, got {}",
                step_width
            )));
        }
        Ok(Self {
            lower_limit,
            upper_limit,
            step_width,
            current: lower_limit,
        })
    }

    /// Lower bound of the range.
    pub fn lower_limit(&self) -> f64 {
        self.lower_limit
    }

    /// Upper bound of the range.
    pub fn upper_limit(&self) -> f64 {
        self.upper_limit
    }

    /// Returns the current value and advances by the step width, or
    /// `None` once the cursor has passed the upper limit.
    pub fn sample(&mut self) -> Option<ParameterValue> {
        if self.current > self.upper_limit {
            return None;
        }
        let value = ParameterValue::Double(self.current);
        self.current += self.step_width;
        Some(value)
    }
}

/// Delegates sampling to an externally registered generator, looked up
/// by its declared type tag.
pub struct UserDefinedDistribution {
    type_tag: String,
    content: String,
    registry: GeneratorRegistry,
}

impl UserDefinedDistribution {
    /// Creates a user-defined distribution backed by a registry.
    pub fn new(
        type_tag: impl Into<String>,
        content: impl Into<String>,
        registry: GeneratorRegistry,
    ) -> Self {
        Self {
            type_tag: type_tag.into(),
            content: content.into(),
            registry,
        }
    }

    /// Next value from the named generator; exhausted immediately when
    /// the tag is unregistered.
    pub fn sample(&mut self) -> Option<ParameterValue> {
        self.registry.sample(&self.type_tag, &self.content)
    }
}

/// One full parameter-name→value tuple, sampled as an atomic unit.
#[derive(Debug, Clone)]
pub struct ParameterValueSet {
    assignments: SampleTuple,
}

impl ParameterValueSet {
    /// Creates a value set. At least one assignment is required.
    pub fn new(assignments: SampleTuple) -> Result<Self, SimError> {
        if assignments.is_empty() {
            return Err(SimError::configuration(
                "ParameterValueSet requires at least one assignment",
            ));
        }
        Ok(Self { assignments })
    }

    /// All assignments at once; never further decomposed.
    pub fn sample(&self) -> SampleTuple {
        self.assignments.clone()
    }
}

/// An ordered list of [`ParameterValueSet`]s, one whole tuple per call.
///
/// Multi-parameter sampling is not a cross product: each entry in the
/// list is one atomic tuple.
#[derive(Debug, Clone)]
pub struct ValueSetDistribution {
    sets: Vec<ParameterValueSet>,
    cursor: usize,
}

impl ValueSetDistribution {
    /// Creates a value-set distribution. At least one set is required.
    pub fn new(sets: Vec<ParameterValueSet>) -> Result<Self, SimError> {
        if sets.is_empty() {
            return Err(SimError::configuration(
                "ValueSetDistribution requires at least one ParameterValueSet",
            ));
        }
        Ok(Self { sets, cursor: 0 })
    }

    /// Next full tuple in list order, or `None` once exhausted.
    pub fn sample(&mut self) -> Option<SampleTuple> {
        let tuple = self.sets.get(self.cursor).map(ParameterValueSet::sample)?;
        self.cursor += 1;
        Some(tuple)
    }
}

/// The sub-kind choice of a single-parameter distribution.
pub enum SingleParameterKind {
    Set(DistributionSet),
    Range(DistributionRange),
    UserDefined(UserDefinedDistribution),
}

impl SingleParameterKind {
    fn sample(&mut self) -> Option<ParameterValue> {
        match self {
            SingleParameterKind::Set(set) => set.sample(),
            SingleParameterKind::Range(range) => range.sample(),
            SingleParameterKind::UserDefined(user) => user.sample(),
        }
    }
}

/// A Set/Range/UserDefined choice bound to one parameter name.
pub struct SingleParameterDistribution {
    parameter_name: String,
    kind: SingleParameterKind,
}

impl SingleParameterDistribution {
    /// Creates a single-parameter distribution.
    pub fn new(parameter_name: impl Into<String>, kind: SingleParameterKind) -> Self {
        Self {
            parameter_name: parameter_name.into(),
            kind,
        }
    }

    /// The parameter name samples are bound under.
    pub fn parameter_name(&self) -> &str {
        &self.parameter_name
    }

    /// Next value from the chosen sub-kind.
    pub fn sample(&mut self) -> Option<ParameterValue> {
        self.kind.sample()
    }
}

/// Wraps a [`ValueSetDistribution`] as a multi-parameter distribution.
#[derive(Debug, Clone)]
pub struct MultiParameterDistribution {
    distribution: ValueSetDistribution,
}

impl MultiParameterDistribution {
    /// Creates a multi-parameter distribution.
    pub fn new(distribution: ValueSetDistribution) -> Self {
        Self { distribution }
    }

    /// Next full tuple from the wrapped value-set distribution.
    pub fn sample(&mut self) -> Option<SampleTuple> {
        self.distribution.sample()
    }
}

/// The Single/Multi choice of one deterministic distribution member.
pub enum DeterministicParameterDistribution {
    Single(SingleParameterDistribution),
    Multi(MultiParameterDistribution),
}

impl DeterministicParameterDistribution {
    /// Draws the next sample and binds every name→value pair into
    /// `scope`. Returns `false` once this member is exhausted.
    ///
    /// Dispatch branches on the member's actual variant; the match is
    /// exhaustive, so neither branch can shadow the other.
    pub fn sample_into(&mut self, scope: &mut Scope) -> bool {
        match self {
            DeterministicParameterDistribution::Single(single) => match single.sample() {
                Some(value) => {
                    scope.insert(single.parameter_name().to_owned(), value);
                    true
                }
                None => false,
            },
            DeterministicParameterDistribution::Multi(multi) => match multi.sample() {
                Some(tuple) => {
                    for (name, value) in tuple {
                        scope.insert(name, value);
                    }
                    true
                }
                None => false,
            },
        }
    }
}

/// An ordered list of heterogeneous Single/Multi distributions.
///
/// Sampling asks the first unexhausted member in list order; an
/// exhausted member is permanently skipped and the list never restarts.
/// The root is exhausted once every member is.
pub struct Deterministic {
    members: Vec<DeterministicParameterDistribution>,
}

impl Deterministic {
    /// Creates a deterministic root. An empty member list is permitted
    /// and is exhausted from the start.
    pub fn new(members: Vec<DeterministicParameterDistribution>) -> Self {
        Self { members }
    }

    /// Binds the next sample into `scope`; `false` once every member is
    /// exhausted.
    pub fn sample(&mut self, scope: &mut Scope) -> bool {
        for member in &mut self.members {
            if member.sample_into(scope) {
                return true;
            }
        }
        debug!("deterministic distribution exhausted");
        false
    }
}

/// The Deterministic/Stochastic choice at the root of a distribution
/// definition.
pub enum DistributionDefinition {
    Deterministic(Deterministic),
}

impl DistributionDefinition {
    /// Wraps a deterministic root.
    pub fn deterministic(root: Deterministic) -> Self {
        Self::Deterministic(root)
    }

    /// Stochastic sampling is unsupported; requesting it always fails.
    pub fn stochastic() -> Result<Self, SimError> {
        Err(SimError::configuration(
            "Stochastic distributions are not supported",
        ))
    }

    /// Binds the next sample into `scope`; `false` once exhausted.
    pub fn sample(&mut self, scope: &mut Scope) -> bool {
        match self {
            DistributionDefinition::Deterministic(root) => root.sample(scope),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lookup_f64(scope: &Scope, name: &str) -> f64 {
        match scope.lookup(name) {
            Some(ParameterValue::Double(v)) => *v,
            other => panic!("expected double for {}, got {:?}", name, other),
        }
    }

    #[test]
    fn test_set_samples_in_order_then_stays_exhausted() {
        let mut set = DistributionSet::new(vec![
            ParameterValue::from("a"),
            ParameterValue::from("b"),
            ParameterValue::from("c"),
        ])
        .unwrap();

        assert_eq!(set.sample(), Some(ParameterValue::from("a")));
        assert_eq!(set.sample(), Some(ParameterValue::from("b")));
        assert_eq!(set.sample(), Some(ParameterValue::from("c")));
        assert_eq!(set.sample(), None);
        assert_eq!(set.sample(), None);
    }

    #[test]
    fn test_empty_set_is_a_configuration_error() {
        assert!(DistributionSet::new(vec![]).is_err());
    }

    #[test]
    fn test_range_includes_both_limits() {
        let mut range = DistributionRange::new(0.0, 1.0, 0.25).unwrap();
        let mut samples = Vec::new();
        while let Some(ParameterValue::Double(v)) = range.sample() {
            samples.push(v);
        }
        assert_eq!(samples, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(range.sample(), None);
    }

    #[test]
    fn test_range_rejects_non_positive_step() {
        assert!(DistributionRange::new(0.0, 10.0, 0.0).is_err());
        assert!(DistributionRange::new(0.0, 10.0, -1.0).is_err());
    }

    #[test]
    fn test_inverted_range_is_exhausted_immediately() {
        let mut range = DistributionRange::new(10.0, 0.0, 1.0).unwrap();
        assert_eq!(range.sample(), None);
    }

    proptest! {
        // Sample count law: floor((upper - lower) / step) + 1, strictly
        // increasing, last value <= upper. Integer-valued bounds keep the
        // arithmetic exact.
        #[test]
        fn prop_range_sample_count(lower in -50i64..50, span in 0i64..100, step in 1i64..10) {
            let upper = lower + span;
            let mut range =
                DistributionRange::new(lower as f64, upper as f64, step as f64).unwrap();

            let mut samples = Vec::new();
            while let Some(ParameterValue::Double(v)) = range.sample() {
                samples.push(v);
            }

            let expected = (span / step) + 1;
            prop_assert_eq!(samples.len() as i64, expected);
            prop_assert!(samples.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(*samples.last().unwrap() <= upper as f64);
            prop_assert!(samples.last().unwrap() + step as f64 > upper as f64);
            prop_assert_eq!(range.sample(), None);
        }
    }

    #[test]
    fn test_user_defined_unregistered_tag_is_exhausted() {
        let mut user =
            UserDefinedDistribution::new("unknown-generator", "", GeneratorRegistry::new());
        assert_eq!(user.sample(), None);
    }

    #[test]
    fn test_user_defined_delegates_to_registered_generator() {
        let mut registry = GeneratorRegistry::new();
        let mut remaining = 2;
        registry.register("countdown", move |content| {
            if remaining == 0 {
                None
            } else {
                remaining -= 1;
                Some(ParameterValue::from(content))
            }
        });

        let mut user = UserDefinedDistribution::new("countdown", "payload", registry);
        assert_eq!(user.sample(), Some(ParameterValue::from("payload")));
        assert_eq!(user.sample(), Some(ParameterValue::from("payload")));
        assert_eq!(user.sample(), None);
    }

    #[test]
    fn test_value_set_distribution_yields_atomic_tuples() {
        let mut dist = ValueSetDistribution::new(vec![
            ParameterValueSet::new(vec![
                ("speed".into(), ParameterValue::Double(3.0)),
                ("lane".into(), ParameterValue::Integer(1)),
            ])
            .unwrap(),
            ParameterValueSet::new(vec![
                ("speed".into(), ParameterValue::Double(6.0)),
                ("lane".into(), ParameterValue::Integer(2)),
            ])
            .unwrap(),
        ])
        .unwrap();

        let first = dist.sample().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0], ("speed".into(), ParameterValue::Double(3.0)));

        let second = dist.sample().unwrap();
        assert_eq!(second[1], ("lane".into(), ParameterValue::Integer(2)));

        assert_eq!(dist.sample(), None);
    }

    #[test]
    fn test_deterministic_drains_members_in_list_order() {
        // Members [A(2 samples), B(3 samples)] yield exactly A,A,B,B,B.
        let a = DeterministicParameterDistribution::Single(SingleParameterDistribution::new(
            "a",
            SingleParameterKind::Set(
                DistributionSet::new(vec![
                    ParameterValue::Double(1.0),
                    ParameterValue::Double(2.0),
                ])
                .unwrap(),
            ),
        ));
        let b = DeterministicParameterDistribution::Single(SingleParameterDistribution::new(
            "b",
            SingleParameterKind::Set(
                DistributionSet::new(vec![
                    ParameterValue::Double(10.0),
                    ParameterValue::Double(20.0),
                    ParameterValue::Double(30.0),
                ])
                .unwrap(),
            ),
        ));

        let mut root = Deterministic::new(vec![a, b]);
        let mut drawn = Vec::new();
        loop {
            let mut scope = Scope::new();
            if !root.sample(&mut scope) {
                break;
            }
            let name = scope.local_names().next().unwrap().to_owned();
            drawn.push((name.clone(), lookup_f64(&scope, &name)));
        }

        assert_eq!(
            drawn,
            vec![
                ("a".to_owned(), 1.0),
                ("a".to_owned(), 2.0),
                ("b".to_owned(), 10.0),
                ("b".to_owned(), 20.0),
                ("b".to_owned(), 30.0),
            ]
        );

        let mut scope = Scope::new();
        assert!(!root.sample(&mut scope));
    }

    #[test]
    fn single_member_samples_through_deterministic_root() {
        // A root holding only a single-parameter member must reach the
        // single-parameter branch on dispatch.
        let member = DeterministicParameterDistribution::Single(SingleParameterDistribution::new(
            "offset",
            SingleParameterKind::Range(DistributionRange::new(0.0, 0.5, 0.5).unwrap()),
        ));
        let mut root = Deterministic::new(vec![member]);

        let mut scope = Scope::new();
        assert!(root.sample(&mut scope));
        assert_eq!(lookup_f64(&scope, "offset"), 0.0);

        let mut scope = Scope::new();
        assert!(root.sample(&mut scope));
        assert_eq!(lookup_f64(&scope, "offset"), 0.5);

        let mut scope = Scope::new();
        assert!(!root.sample(&mut scope));
    }

    #[test]
    fn test_multi_member_binds_whole_tuple() {
        let multi = DeterministicParameterDistribution::Multi(MultiParameterDistribution::new(
            ValueSetDistribution::new(vec![ParameterValueSet::new(vec![
                ("x".into(), ParameterValue::Double(1.0)),
                ("y".into(), ParameterValue::Double(2.0)),
            ])
            .unwrap()])
            .unwrap(),
        ));
        let mut root = Deterministic::new(vec![multi]);

        let mut scope = Scope::new();
        assert!(root.sample(&mut scope));
        assert_eq!(lookup_f64(&scope, "x"), 1.0);
        assert_eq!(lookup_f64(&scope, "y"), 2.0);
    }

    #[test]
    fn test_empty_deterministic_root_is_exhausted() {
        let mut root = Deterministic::new(vec![]);
        let mut scope = Scope::new();
        assert!(!root.sample(&mut scope));
    }

    #[test]
    fn test_stochastic_definition_fails_explicitly() {
        match DistributionDefinition::stochastic() {
            Err(SimError::Configuration(msg)) => {
                assert!(msg.contains("Stochastic"));
            }
            _ => panic!("stochastic construction must fail"),
        }
    }
}
