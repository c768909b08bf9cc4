#![no_main]

use libfuzzer_sys::fuzz_target;
use shaper::{DiError, Resolver, ServiceCollection};
use std::sync::Arc;

struct TestService {
    value: i32,
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }

    let pattern = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let value = i32::from_le_bytes([data[4], data[5], data[6], data[7]]);

    let mut services = ServiceCollection::new();
    match pattern % 4 {
        0 => {
            services.add_singleton_instance(TestService { value });
        }
        1 => {
            services.add_singleton_factory::<TestService, _>(move |_| Ok(TestService { value }));
        }
        2 => {
            services.add_scoped_factory::<TestService, _>(move |_| Ok(TestService { value }));
        }
        _ => {
            services.add_transient_factory::<TestService, _>(move |_| Ok(TestService { value }));
        }
    }

    let provider = services.build();
    let scope = provider.create_scope();

    let from_scope = scope.get_required::<TestService>().expect("registered service resolves in a scope");
    assert_eq!(from_scope.value, value);

    match provider.get_required::<TestService>() {
        Ok(service) => {
            assert_eq!(service.value, value);
            if pattern % 4 < 2 {
                assert!(Arc::ptr_eq(&service, &from_scope));
            }
        }
        Err(DiError::WrongLifetime(_)) => assert_eq!(pattern % 4, 2),
        Err(other) => panic!("unexpected error: {other}"),
    }

    scope.dispose();
    provider.dispose();
    assert!(matches!(provider.get_required::<TestService>(), Err(DiError::Disposed)));
});
