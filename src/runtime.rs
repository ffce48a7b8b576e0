//! Native functions user code can reach with `extern`.

/// putchard - writes the character with code `x` to stderr, returns 0
#[no_mangle]
pub extern "C" fn putchard(x: f64) -> f64 {
    eprint!("{}", x as u8 as char);
    0.0
}

/// printd - prints `x` on its own line to stdout, returns 0
#[no_mangle]
pub extern "C" fn printd(x: f64) -> f64 {
    println!("{}", x);
    0.0
}

type NativeFn = extern "C" fn(f64) -> f64;

/// address of the runtime function called `name`, if there is one
pub fn symbol_address(name: &str) -> Option<usize> {
    match name {
        "putchard" => Some(putchard as NativeFn as usize),
        "printd" => Some(printd as NativeFn as usize),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn knows_its_symbols() {
        assert!(symbol_address("putchard").is_some());
        assert!(symbol_address("printd").is_some());
        assert_ne!(symbol_address("putchard"), symbol_address("printd"));
        assert_eq!(symbol_address("sin"), None);
    }

    #[test]
    fn returns_zero() {
        assert_eq!(printd(1.5), 0.0);
        assert_eq!(putchard(10.0), 0.0);
    }
}
