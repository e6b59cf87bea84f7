//! Validation engine
//!
//! Runs every per-kind checker over one [`Snapshot`] and merges the results.
//! Checkers are independent and pure, so a run is a fold over their outputs
//! followed by the configured post-processing (ignored codes, pruning).

use meshcheck_common::{Result, Snapshot, ValidationConfig, ValidationSet};
use tracing::{debug, info, instrument};

use crate::checker::{CheckContext, ObjectChecker};
use crate::checkers::{
    AuthorizationPolicyChecker, DestinationRuleChecker, GatewayChecker,
    PeerAuthenticationChecker, SidecarChecker, VirtualServiceChecker,
};

/// Validates mesh snapshots against one configuration
#[derive(Clone, Debug, Default)]
pub struct ValidationEngine {
    config: ValidationConfig,
}

impl ValidationEngine {
    /// Create an engine
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Create an engine from a YAML configuration document
    pub fn from_yaml(input: &str) -> Result<Self> {
        Ok(Self::new(ValidationConfig::from_yaml(input)?))
    }

    /// The run configuration
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Every checker, in run order
    pub fn checkers(&self) -> Vec<Box<dyn ObjectChecker>> {
        vec![
            Box::new(DestinationRuleChecker),
            Box::new(VirtualServiceChecker),
            Box::new(GatewayChecker),
            Box::new(SidecarChecker),
            Box::new(PeerAuthenticationChecker),
            Box::new(AuthorizationPolicyChecker),
        ]
    }

    /// Validate every object in `snapshot`.
    ///
    /// Only objects with at least one finding or reference appear in the
    /// result. Codes listed in `ignoredChecks` are removed and validity is
    /// re-derived from what remains.
    #[instrument(
        name = "validation_run",
        skip(self, snapshot),
        fields(cluster = %snapshot.cluster, objects = snapshot.object_count())
    )]
    pub fn validate(&self, snapshot: &Snapshot) -> ValidationSet {
        let ctx = CheckContext::new(snapshot, &self.config);
        let mut validations = ValidationSet::new();

        for checker in self.checkers() {
            let found = checker.check(&ctx);
            debug!(checker = checker.name(), objects = found.len(), "checker finished");
            validations.merge(found);
        }

        validations.strip_checks(&self.config.ignored_checks);
        validations.prune_empty();

        let summary = validations.summarize(None, None);
        info!(
            errors = summary.errors,
            warnings = summary.warnings,
            flagged = summary.object_count,
            "validation complete"
        );
        validations
    }

    /// Validate `snapshot` and keep only objects declared in `namespace`.
    ///
    /// Conflicts are still detected across the whole snapshot, so an object
    /// may reference objects outside `namespace`.
    pub fn validate_namespace(&self, snapshot: &Snapshot, namespace: &str) -> ValidationSet {
        self.validate(snapshot).for_namespace(namespace)
    }
}
