//! Host stack growth for deep recursion.
//!
//! Parsing, evaluation and structural operations on values (printing,
//! comparison, hashing) recurse once per nesting level. Wrapping those
//! recursive entry points in [`ensure_sufficient_stack`] grows the native
//! stack on demand, so depth is bounded by the parser's nesting limit and
//! the configured recursion limit rather than by the host stack.

/// Grow when less than this much stack remains.
const RED_ZONE: usize = 100 * 1024;

/// Size of each new stack segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

#[cfg(test)]
mod tests {
    use super::ensure_sufficient_stack;

    fn depth(n: u64) -> u64 {
        ensure_sufficient_stack(|| if n == 0 { 0 } else { 1 + depth(n - 1) })
    }

    #[test]
    fn deep_recursion_does_not_overflow() {
        assert_eq!(depth(200_000), 200_000);
    }
}
