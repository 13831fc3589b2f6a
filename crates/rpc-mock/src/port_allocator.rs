//! Port allocation for tests that need predictable, free port ranges.

use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    net::{SocketAddr, TcpListener},
    sync::{LazyLock, Mutex},
    time::SystemTime,
};

const FIRST_PORT: u16 = 20000;
const PORT_SPAN: u16 = 20000;

/// Next candidate port, starting at a random offset so concurrent test
/// binaries rarely probe the same ranges.
static NEXT_PORT: LazyLock<Mutex<u16>> = LazyLock::new(|| {
    let mut hasher = DefaultHasher::new();
    SystemTime::now().hash(&mut hasher);
    std::process::id().hash(&mut hasher);
    #[allow(clippy::cast_possible_truncation)]
    let random_offset = (hasher.finish() % u64::from(PORT_SPAN)) as u16;
    Mutex::new(FIRST_PORT + random_offset)
});

/// Allocates a single free port.
///
/// # Panics
///
/// Panics if no free port is found.
#[must_use]
pub fn allocate_port() -> u16 {
    allocate_port_range(1)
}

/// Allocates `count` consecutive free ports and returns the first one.
///
/// # Panics
///
/// Panics if `count` is zero or no free range is found.
#[must_use]
pub fn allocate_port_range(count: u16) -> u16 {
    assert!(count > 0, "cannot allocate an empty port range");
    assert!(count <= PORT_SPAN, "no free range of {count} ports found");

    let mut next = NEXT_PORT.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

    for _ in 0..PORT_SPAN {
        if *next > FIRST_PORT + PORT_SPAN - count {
            *next = FIRST_PORT;
        }

        let first = *next;
        *next += count;

        if (first..first + count).all(is_port_available) {
            return first;
        }
    }

    panic!("no free range of {count} ports found")
}

/// Checks whether a port is available by attempting to bind to it.
#[must_use]
pub fn is_port_available(port: u16) -> bool {
    TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], port))).is_ok()
}
