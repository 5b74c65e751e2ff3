//! Module dependency resolution and topological ordering.
//!
//! The kernel starts enabled modules in dependency order and stops them in
//! reverse. The graph is rebuilt from scratch on every start/stop: module
//! sets are small and the rebuild keeps no state to invalidate.
//!
//! # Representation
//!
//! Modules are mapped to dense indices; edges are adjacency lists of
//! indices with a parallel in-degree array, so Kahn's algorithm runs
//! allocation-free after setup and needs no back-pointers into the module
//! set.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use banyan_component::Module;
use banyan_types::ErrorCode;
use semver::{Version, VersionReq};
use thiserror::Error;

/// Dependency analysis failure.
///
/// # Error Code Convention
///
/// | Error | Code | Recoverable |
/// |-------|------|-------------|
/// | [`InvalidVersion`](DependencyError::InvalidVersion) | `DEP_INVALID_VERSION` | No |
/// | [`InvalidConstraint`](DependencyError::InvalidConstraint) | `DEP_INVALID_CONSTRAINT` | No |
/// | [`Unsatisfied`](DependencyError::Unsatisfied) | `DEP_UNSATISFIED` | No |
/// | [`MissingDependency`](DependencyError::MissingDependency) | `DEP_MISSING` | No |
/// | [`Cycle`](DependencyError::Cycle) | `DEP_CYCLE` | No |
#[derive(Debug, Error)]
pub enum DependencyError {
    /// A module's own version string does not parse as semver.
    #[error("module {module} has invalid version {version:?}: {source}")]
    InvalidVersion {
        /// Module whose version is malformed.
        module: String,
        /// The offending version string.
        version: String,
        /// Parser diagnostic.
        source: semver::Error,
    },

    /// A declared constraint does not parse as a semver requirement.
    #[error("module {module} has invalid constraint {constraint:?} for dependency {dependency}: {source}")]
    InvalidConstraint {
        /// Module declaring the constraint.
        module: String,
        /// The dependency the constraint applies to.
        dependency: String,
        /// The offending constraint string.
        constraint: String,
        /// Parser diagnostic.
        source: semver::Error,
    },

    /// The dependency is present but its version violates the constraint.
    #[error("module {module} requires {dependency} matching {constraint:?}, but found version {found}")]
    Unsatisfied {
        /// Module declaring the constraint.
        module: String,
        /// The dependency that failed the check.
        dependency: String,
        /// The declared constraint.
        constraint: String,
        /// The dependency's actual version.
        found: Version,
    },

    /// The dependency is absent from the enabled module set.
    ///
    /// Covers both unknown modules and present-but-disabled ones; a
    /// disabled module does not satisfy anyone's dependency.
    #[error("module {module} depends on missing or disabled module {dependency}")]
    MissingDependency {
        /// Module declaring the dependency.
        module: String,
        /// The absent dependency.
        dependency: String,
    },

    /// The dependency graph contains a cycle.
    #[error("circular dependency detected among modules")]
    Cycle,
}

impl ErrorCode for DependencyError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidVersion { .. } => "DEP_INVALID_VERSION",
            Self::InvalidConstraint { .. } => "DEP_INVALID_CONSTRAINT",
            Self::Unsatisfied { .. } => "DEP_UNSATISFIED",
            Self::MissingDependency { .. } => "DEP_MISSING",
            Self::Cycle => "DEP_CYCLE",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Computes the startup order of the enabled module set.
///
/// Performs, in order:
///
/// 1. semver validation of every module's own version
/// 2. per-dependency presence, constraint-parse, and satisfaction checks
/// 3. Kahn's topological sort, seeded in lexicographic name order so the
///    result is deterministic among independent modules
///
/// # Errors
///
/// The first [`DependencyError`] encountered; [`DependencyError::Cycle`]
/// when fewer modules can be ordered than were given.
pub fn startup_order(
    enabled: &BTreeMap<String, Arc<dyn Module>>,
) -> Result<Vec<Arc<dyn Module>>, DependencyError> {
    let names: Vec<&String> = enabled.keys().collect();
    let modules: Vec<&Arc<dyn Module>> = enabled.values().collect();
    let index: HashMap<&str, usize> = names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let mut versions = Vec::with_capacity(modules.len());
    for (name, module) in enabled.iter() {
        let version = Version::parse(module.version()).map_err(|source| {
            DependencyError::InvalidVersion {
                module: name.clone(),
                version: module.version().to_string(),
                source,
            }
        })?;
        versions.push(version);
    }

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); modules.len()];
    let mut in_degree = vec![0usize; modules.len()];

    for (i, (name, module)) in enabled.iter().enumerate() {
        // BTreeMap iteration keeps error selection deterministic.
        let declared: BTreeMap<String, String> = module.dependencies().into_iter().collect();
        for (dep_name, constraint) in declared {
            let Some(&j) = index.get(dep_name.as_str()) else {
                return Err(DependencyError::MissingDependency {
                    module: name.clone(),
                    dependency: dep_name,
                });
            };

            let req = parse_constraint(&constraint).map_err(|source| {
                DependencyError::InvalidConstraint {
                    module: name.clone(),
                    dependency: dep_name.clone(),
                    constraint: constraint.clone(),
                    source,
                }
            })?;

            if !req.matches(&versions[j]) {
                return Err(DependencyError::Unsatisfied {
                    module: name.clone(),
                    dependency: dep_name,
                    constraint,
                    found: versions[j].clone(),
                });
            }

            dependents[j].push(i);
            in_degree[i] += 1;
        }
    }

    let mut queue: VecDeque<usize> = (0..modules.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(modules.len());

    while let Some(i) = queue.pop_front() {
        order.push(Arc::clone(modules[i]));
        for &dependent in &dependents[i] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                queue.push_back(dependent);
            }
        }
    }

    if order.len() != modules.len() {
        return Err(DependencyError::Cycle);
    }

    Ok(order)
}

/// Computes the shutdown order: startup order, reversed.
///
/// # Errors
///
/// Same failure modes as [`startup_order`].
pub fn shutdown_order(
    enabled: &BTreeMap<String, Arc<dyn Module>>,
) -> Result<Vec<Arc<dyn Module>>, DependencyError> {
    let mut order = startup_order(enabled)?;
    order.reverse();
    Ok(order)
}

/// Parses a version constraint.
///
/// Accepts the semver crate's comma-separated syntax directly and falls
/// back to treating whitespace as the separator (`">=2.1.0 <3.0.0"`), the
/// form common in other ecosystems' manifests.
fn parse_constraint(constraint: &str) -> Result<VersionReq, semver::Error> {
    match VersionReq::parse(constraint) {
        Ok(req) => Ok(req),
        Err(err) => {
            let parts: Vec<&str> = constraint.split_whitespace().collect();
            if parts.len() > 1 {
                VersionReq::parse(&parts.join(", ")).map_err(|_| err)
            } else {
                Err(err)
            }
        }
    }
}
