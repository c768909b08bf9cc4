use shaper::{DiError, DiResult, Injectable, Resolver, ResolverContext, ServiceCollection};
use std::sync::Arc;

#[allow(dead_code)]
struct ServiceA {
    b: Arc<ServiceB>,
}

#[allow(dead_code)]
struct ServiceB {
    a: Arc<ServiceA>,
}

#[test]
fn test_circular_dependency_detection() {
    let mut sc = ServiceCollection::new();

    sc.add_singleton_factory::<ServiceA, _>(|r| Ok(ServiceA { b: r.get_required::<ServiceB>()? }));
    sc.add_singleton_factory::<ServiceB, _>(|r| Ok(ServiceB { a: r.get_required::<ServiceA>()? }));

    let sp = sc.build();

    match sp.get_required::<ServiceA>() {
        Err(DiError::Circular(path)) => {
            assert_eq!(path.len(), 3);
            assert!(path[0].ends_with("ServiceA"));
            assert!(path[1].ends_with("ServiceB"));
            assert!(path[2].ends_with("ServiceA"));
        }
        other => panic!("expected circular error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_self_dependency() {
    #[allow(dead_code)]
    struct Loop(Arc<Loop>);

    let mut sc = ServiceCollection::new();
    sc.add_transient_factory::<Loop, _>(|r| Ok(Loop(r.get_required::<Loop>()?)));

    let sp = sc.build();
    let err = sp.get_required::<Loop>().err().expect("self dependency must fail");
    assert!(matches!(&err, DiError::Circular(path) if path.len() == 2));
    assert!(err.to_string().starts_with("Circular dependency: "));
}

#[test]
fn test_cycle_in_scope() {
    #[allow(dead_code)]
    struct Left(Arc<Right>);
    #[allow(dead_code)]
    struct Right(Arc<Left>);

    let mut sc = ServiceCollection::new();
    sc.add_scoped_factory::<Left, _>(|r| Ok(Left(r.get_required::<Right>()?)));
    sc.add_scoped_factory::<Right, _>(|r| Ok(Right(r.get_required::<Left>()?)));

    let sp = sc.build();
    let scope = sp.create_scope();
    assert!(matches!(scope.get_required::<Right>(), Err(DiError::Circular(_))));
}

#[test]
fn test_container_usable_after_cycle() {
    let mut sc = ServiceCollection::new();
    sc.add_singleton_factory::<ServiceA, _>(|r| Ok(ServiceA { b: r.get_required::<ServiceB>()? }));
    sc.add_singleton_factory::<ServiceB, _>(|r| Ok(ServiceB { a: r.get_required::<ServiceA>()? }));
    sc.add_singleton_instance(11u8);

    let sp = sc.build();
    assert!(sp.get_required::<ServiceB>().is_err());

    // The resolution stack is unwound after the failure
    assert_eq!(*sp.get_required::<u8>().unwrap(), 11);
    assert!(matches!(sp.get_required::<ServiceB>(), Err(DiError::Circular(_))));
}

struct Ping {
    _pong: Arc<Pong>,
}

struct Pong {
    _ping: Arc<Ping>,
}

impl Injectable for Ping {
    fn inject(r: &ResolverContext<'_>) -> DiResult<Self> {
        Ok(Ping { _pong: r.resolve::<Pong>()? })
    }
}

impl Injectable for Pong {
    fn inject(r: &ResolverContext<'_>) -> DiResult<Self> {
        Ok(Pong { _ping: r.resolve::<Ping>()? })
    }
}

#[test]
fn test_cycle_through_blind_construction() {
    let sp = ServiceCollection::new().build();
    assert!(matches!(sp.resolve::<Ping>(), Err(DiError::Circular(_))));
}

#[test]
fn test_diamond_is_not_a_cycle() {
    struct Root;
    struct Left(#[allow(dead_code)] Arc<Root>);
    struct Right(#[allow(dead_code)] Arc<Root>);
    struct Top(#[allow(dead_code)] Arc<Left>, #[allow(dead_code)] Arc<Right>);

    let mut sc = ServiceCollection::new();
    sc.add_transient_factory::<Root, _>(|_| Ok(Root));
    sc.add_transient_factory::<Left, _>(|r| Ok(Left(r.get_required::<Root>()?)));
    sc.add_transient_factory::<Right, _>(|r| Ok(Right(r.get_required::<Root>()?)));
    sc.add_transient_factory::<Top, _>(|r| {
        Ok(Top(r.get_required::<Left>()?, r.get_required::<Right>()?))
    });

    let sp = sc.build();
    assert!(sp.get_required::<Top>().is_ok());
}
