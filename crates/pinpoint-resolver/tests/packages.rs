use std::collections::BTreeMap;

use pinpoint_core::catalog::{DependencySpec, InMemoryCatalog, UnitMetadata};
use pinpoint_core::config::ResolverConfig;
use pinpoint_resolver::packages::{
    PackageConstraint, PackagesResolveOptions, PackagesResolver, Pricing,
};
use pinpoint_util::errors::PinpointError;

type Deps<'a> = &'a [(&'a str, &'a str)];

fn catalog(rows: &[(&str, &str, Deps<'_>)]) -> InMemoryCatalog {
    rows.iter()
        .try_fold(InMemoryCatalog::new(), |catalog, (name, version, deps)| {
            catalog.with_version(name, version, deps)
        })
        .unwrap()
}

fn seed() -> InMemoryCatalog {
    catalog(&[
        ("sparky-forms", "1.1.2", &[("forms", "=1.0.1"), ("sparkle", "=2.1.1")]),
        ("sparky-forms", "1.0.0", &[("awesome-dropdown", "=1.4.0")]),
        ("forms", "1.0.1", &[("sparkle", "2.1.0"), ("jquery-widgets", "1.0.0")]),
        ("sparkle", "2.1.0", &[("jquery", "1.8.2")]),
        ("sparkle", "2.1.1", &[("jquery", "1.8.2")]),
        ("sparkle", "1.0.0", &[]),
        ("awesome-dropdown", "1.4.0", &[("dropdown", "=1.2.2")]),
        ("awesome-dropdown", "1.5.0", &[("dropdown", "=1.2.2")]),
        ("dropdown", "1.2.2", &[("jquery-widgets", "1.0.0")]),
        ("jquery-widgets", "1.0.0", &[("jquery", "1.8.0"), ("sparkle", "2.1.1")]),
        ("jquery-widgets", "1.0.2", &[("jquery", "1.8.0"), ("sparkle", "2.1.1")]),
        ("jquery", "1.8.0", &[]),
        ("jquery", "1.8.2", &[]),
    ])
}

/// Split `{package: constraint}` into dependencies and constraints. A
/// constraint starting with `w` is weak: it constrains without depending.
fn split(request: &[(&str, &str)]) -> (Vec<String>, Vec<PackageConstraint>) {
    let mut dependencies = Vec::new();
    let mut constraints = Vec::new();
    for &(name, constraint) in request {
        let constraint = match constraint.strip_prefix('w') {
            Some(weak) => weak,
            None => {
                dependencies.push(name.to_string());
                constraint
            }
        };
        let constraint = PackageConstraint::new(name, constraint);
        if constraint.constraint.is_some() {
            constraints.push(constraint);
        }
    }
    (dependencies, constraints)
}

fn testing() -> PackagesResolveOptions {
    PackagesResolveOptions {
        pricing: Pricing::Magnitude,
        ..PackagesResolveOptions::default()
    }
}

fn answer(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn solve(
    catalog: &InMemoryCatalog,
    request: &[(&str, &str)],
    options: &PackagesResolveOptions,
) -> Result<BTreeMap<String, String>, PinpointError> {
    let (dependencies, constraints) = split(request);
    let mut resolver = PackagesResolver::new(catalog);
    resolver
        .resolve(&dependencies, &constraints, options)
        .map(|solution| solution.answer)
}

#[test]
fn simple_exact_and_regular_dependencies() {
    let catalog = seed();
    assert_eq!(
        solve(&catalog, &[("sparky-forms", "=1.1.2")], &testing()).unwrap(),
        answer(&[
            ("sparky-forms", "1.1.2"),
            ("forms", "1.0.1"),
            ("sparkle", "2.1.1"),
            ("jquery-widgets", "1.0.0"),
            ("jquery", "1.8.2"),
        ])
    );
    assert_eq!(
        solve(
            &catalog,
            &[("sparky-forms", "=1.1.2"), ("awesome-dropdown", "=1.5.0")],
            &testing()
        )
        .unwrap(),
        answer(&[
            ("sparky-forms", "1.1.2"),
            ("forms", "1.0.1"),
            ("sparkle", "2.1.1"),
            ("jquery-widgets", "1.0.0"),
            ("jquery", "1.8.2"),
            ("awesome-dropdown", "1.5.0"),
            ("dropdown", "1.2.2"),
        ])
    );
}

#[test]
fn non_exact_direct_dependency() {
    // sparky-forms 1.0.0 needs awesome-dropdown 1.4.0, which the pin rules out
    let catalog = seed();
    assert_eq!(
        solve(
            &catalog,
            &[("sparky-forms", "1.0.0"), ("awesome-dropdown", "=1.5.0")],
            &testing()
        )
        .unwrap(),
        answer(&[
            ("sparky-forms", "1.1.2"),
            ("forms", "1.0.1"),
            ("sparkle", "2.1.1"),
            ("jquery-widgets", "1.0.0"),
            ("jquery", "1.8.2"),
            ("awesome-dropdown", "1.5.0"),
            ("dropdown", "1.2.2"),
        ])
    );
}

#[test]
fn conflicting_indirect_requirements_report_both_paths() {
    let catalog = catalog(&[
        ("bad-1", "1.0.0", &[("indirect", "1.0.0")]),
        ("bad-2", "1.0.0", &[("indirect", "2.0.0")]),
        ("indirect", "1.0.0", &[]),
        ("indirect", "2.0.0", &[]),
    ]);
    let err = solve(&catalog, &[("bad-1", "1.0.0"), ("bad-2", "")], &testing()).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("indirect"), "got: {message}");
    assert!(message.contains("bad-1@1.0.0"), "got: {message}");
    assert!(message.contains("bad-2@1.0.0"), "got: {message}");
    assert!(!message.contains('#'), "got: {message}");
}

#[test]
fn top_level_constraint_against_dependency_constraint() {
    let catalog = catalog(&[
        ("foo", "1.0.0", &[]),
        ("foo", "1.1.0", &[]),
        ("foo", "2.0.0", &[]),
        ("foo", "2.1.0", &[]),
        ("bar", "1.0.0", &[("foo", "1.0.0")]),
    ]);
    let err = solve(&catalog, &[("foo", "2.0.0"), ("bar", "1.0.0")], &testing()).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("foo@2.0.0 <- top level"), "got: {message}");
    assert!(message.contains("foo@1.0.0 <- bar@1.0.0"), "got: {message}");
}

#[test]
fn unknown_package() {
    let catalog = InMemoryCatalog::new();
    let err = solve(&catalog, &[("foo", "1.0.0")], &testing()).unwrap_err();
    assert!(matches!(err, PinpointError::UnknownUnit { ref name } if name == "foo"));
    assert_eq!(err.to_string(), "Unknown unit: foo");
}

#[test]
fn weak_constraint_still_applies() {
    let catalog = catalog(&[("foo", "2.0.0", &[]), ("bar", "1.0.0", &[("foo", "")])]);
    let err = solve(&catalog, &[("foo", "w1.0.0"), ("bar", "1.0.0")], &testing()).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("No version of foo"), "got: {message}");
    assert!(message.contains("top level"), "got: {message}");
}

#[test]
fn weak_constraint_alone_pulls_nothing_in() {
    let catalog = catalog(&[("foo", "2.0.0", &[]), ("bar", "1.0.0", &[])]);
    let result = solve(&catalog, &[("foo", "w2.0.0"), ("bar", "1.0.0")], &testing()).unwrap();
    assert_eq!(result, answer(&[("bar", "1.0.0")]));
}

#[test]
fn any_of_constraints() {
    let catalog = catalog(&[
        ("one-of", "1.0.0", &[("indirect", "1.0.0 || 2.0.0")]),
        ("important", "1.0.0", &[("indirect", "2.0.0")]),
        ("indirect", "1.0.0", &[]),
        ("indirect", "2.0.0", &[]),
    ]);
    assert_eq!(
        solve(
            &catalog,
            &[("one-of", "=1.0.0"), ("important", "1.0.0")],
            &testing()
        )
        .unwrap(),
        answer(&[
            ("one-of", "1.0.0"),
            ("important", "1.0.0"),
            ("indirect", "2.0.0"),
        ])
    );

    let catalog = self::catalog(&[
        ("one-of", "1.0.0", &[("indirect", "1.0.0 || 2.0.0")]),
        ("one-of-equal", "1.0.0", &[("indirect", "1.0.0 || =2.0.1")]),
        ("important", "1.0.0", &[("indirect", "1.0.0")]),
        ("indirect", "1.0.0", &[]),
        ("indirect", "2.0.0", &[]),
        ("indirect", "2.0.1", &[]),
    ]);
    assert_eq!(
        solve(
            &catalog,
            &[("one-of", "=1.0.0"), ("important", "1.0.0")],
            &testing()
        )
        .unwrap(),
        answer(&[
            ("one-of", "1.0.0"),
            ("important", "1.0.0"),
            ("indirect", "1.0.0"),
        ])
    );
    assert_eq!(
        solve(
            &catalog,
            &[("one-of-equal", "1.0.0"), ("indirect", "2.0.0")],
            &testing()
        )
        .unwrap(),
        answer(&[("one-of-equal", "1.0.0"), ("indirect", "2.0.1")])
    );
    assert_eq!(
        solve(
            &catalog,
            &[("one-of-equal", "1.0.0"), ("one-of", "1.0.0")],
            &testing()
        )
        .unwrap(),
        answer(&[
            ("one-of-equal", "1.0.0"),
            ("one-of", "1.0.0"),
            ("indirect", "1.0.0"),
        ])
    );

    let err = solve(
        &catalog,
        &[
            ("one-of-equal", "1.0.0"),
            ("one-of", "1.0.0"),
            ("indirect", "=2.0.0"),
        ],
        &testing(),
    )
    .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("top level"), "got: {message}");
    assert!(message.contains("one-of-equal@1.0.0"), "got: {message}");
}

#[test]
fn previous_solution() {
    let catalog = seed();
    let locked = answer(&[
        ("sparky-forms", "1.0.0"),
        ("awesome-dropdown", "1.4.0"),
        ("dropdown", "1.2.2"),
        ("jquery-widgets", "1.0.0"),
        ("jquery", "1.8.2"),
        ("sparkle", "2.1.1"),
    ]);
    let latest = answer(&[
        ("sparky-forms", "1.1.2"),
        ("forms", "1.0.1"),
        ("sparkle", "2.1.1"),
        ("jquery-widgets", "1.0.0"),
        ("jquery", "1.8.2"),
    ]);

    assert_eq!(solve(&catalog, &[("sparky-forms", "=1.0.0")], &testing()).unwrap(), locked);
    assert_eq!(solve(&catalog, &[("sparky-forms", "1.0.0")], &testing()).unwrap(), latest);

    let with_previous = PackagesResolveOptions {
        previous_solution: answer(&[("sparky-forms", "1.0.0")]),
        ..testing()
    };
    assert_eq!(
        solve(&catalog, &[("sparky-forms", "1.0.0")], &with_previous).unwrap(),
        locked
    );
    // An unreachable previous solution is dropped, not an error.
    assert_eq!(
        solve(&catalog, &[("sparky-forms", "1.1.2")], &with_previous).unwrap(),
        latest
    );

    let upgrading = PackagesResolveOptions {
        upgrade: vec!["sparky-forms".to_string()],
        ..with_previous
    };
    assert_eq!(
        solve(&catalog, &[("sparky-forms", "1.0.0")], &upgrading).unwrap(),
        latest
    );
}

#[test]
fn no_constraint_dependency_gets_anything() {
    let catalog = seed();
    let result = solve(&catalog, &[("sparkle", "")], &testing()).unwrap();
    assert!(result.contains_key("sparkle"));
}

#[test]
fn no_constraint_dependency_still_follows_transitive_pins() {
    let catalog = seed();
    let mut resolver = PackagesResolver::new(&catalog);
    let solution = resolver
        .resolve(
            &["sparkle", "sparky-forms"],
            &[PackageConstraint::parse("sparky-forms@1.1.2").unwrap()],
            &testing(),
        )
        .unwrap();
    assert_eq!(solution.answer["sparkle"], "2.1.1");
    assert!(!solution.used_rcs);
}

#[test]
fn build_metadata_is_hidden_from_answer() {
    let catalog = catalog(&[("foo", "1.0.1+local", &[])]);
    let result = solve(&catalog, &[("foo", "1.0.1")], &PackagesResolveOptions::default()).unwrap();
    assert_eq!(result, answer(&[("foo", "1.0.1")]));
}

#[test]
fn tiered_pricing_prefers_latest_roots() {
    let catalog = seed();
    let result = solve(&catalog, &[("sparky-forms", "")], &PackagesResolveOptions::default())
        .unwrap();
    assert_eq!(result["sparky-forms"], "1.1.2");
    assert_eq!(result["sparkle"], "2.1.1");
}

#[test]
fn prerelease_fallback() {
    let catalog = catalog(&[("next", "2.0.0-rc.1", &[])]);
    let mut resolver = PackagesResolver::new(&catalog);
    let solution = resolver
        .resolve(&["next"], &[], &PackagesResolveOptions::default())
        .unwrap();
    assert!(solution.used_rcs);
    assert_eq!(solution.answer["next"], "2.0.0-rc.1");

    let config = ResolverConfig {
        prerelease_fallback: false,
        ..ResolverConfig::default()
    };
    let mut resolver = PackagesResolver::with_config(&catalog, config);
    let err = resolver
        .resolve(&["next"], &[], &PackagesResolveOptions::default())
        .unwrap_err();
    assert!(err.is_resolution_failure());
}

#[test]
fn iteration_cap_interrupts() {
    let catalog = seed();
    let config = ResolverConfig {
        max_iterations: Some(1),
        ..ResolverConfig::default()
    };
    let mut resolver = PackagesResolver::with_config(&catalog, config);
    let err = resolver
        .resolve(&["sparky-forms"], &[], &PackagesResolveOptions::default())
        .unwrap_err();
    assert!(matches!(err, PinpointError::Interrupted { .. }));
}

#[test]
fn arch_specific_dependencies() {
    let mut catalog = InMemoryCatalog::new();
    catalog
        .add_version(
            "app",
            "1.0.0",
            UnitMetadata {
                earliest_compatible_version: None,
                dependencies: vec![
                    DependencySpec::new("client", Some("1.0.0")).with_archs(&["web"]),
                    DependencySpec::new("server", Some("3.0.0")).with_archs(&["os"]),
                ],
            },
        )
        .unwrap();
    let catalog = catalog
        .with_version("client", "1.0.0", &[])
        .unwrap()
        .with_version("client", "1.4.0", &[])
        .unwrap()
        .with_version("server", "3.0.0", &[])
        .unwrap();

    let mut resolver = PackagesResolver::new(&catalog);
    let solution = resolver
        .resolve(&["app"], &[], &PackagesResolveOptions::default())
        .unwrap();
    assert_eq!(
        solution.answer,
        answer(&[("app", "1.0.0"), ("client", "1.0.0"), ("server", "3.0.0")])
    );
}

#[test]
fn forgotten_ecvs_make_constraints_satisfiable() {
    let mut catalog = catalog(&[
        ("local", "1.3.0", &[]),
        ("app", "1.0.0", &[("local", "1.1.0")]),
    ]);
    let err = solve(&catalog, &[("app", "")], &testing()).unwrap_err();
    assert!(err.is_resolution_failure());

    catalog.add_forgotten_ecv("local", "1.1.0", "1.0.0");
    let result = solve(&catalog, &[("app", "")], &testing()).unwrap();
    assert_eq!(result["local"], "1.3.0");
}

#[test]
fn failed_load_keeps_failing() {
    let mut catalog = InMemoryCatalog::new();
    catalog
        .add_version(
            "app",
            "1.0.0",
            UnitMetadata {
                earliest_compatible_version: None,
                dependencies: vec![DependencySpec::new("lib", None).with_archs(&["wasm"])],
            },
        )
        .unwrap();
    let catalog = catalog.with_version("lib", "1.0.0", &[]).unwrap();

    let mut resolver = PackagesResolver::new(&catalog);
    for _ in 0..2 {
        let err = resolver
            .resolve(&["app"], &[], &PackagesResolveOptions::default())
            .unwrap_err();
        assert!(matches!(err, PinpointError::Catalog { .. }), "got: {err}");
        assert!(err.to_string().contains("wasm"), "got: {err}");
    }
}
