//! Type tags recorded in the envelope.

use crate::config::TypeIdentity;

/// Type tag for `T` in the requested identity form.
///
/// References and the `Box`, `Arc` and `Rc` wrappers are tagged as the value
/// they point to, since serde writes them exactly like that value.
pub fn type_tag<T: ?Sized>(identity: TypeIdentity) -> String {
    let full = rust_type_name::<T>();
    match identity {
        TypeIdentity::Full => full.to_string(),
        TypeIdentity::Simple => simplify_type_name(full),
    }
}

/// Strip every module path from a Rust type name.
///
/// Generic arguments, tuples and slices keep their structure:
/// `alloc::vec::Vec<core::net::ip_addr::IpAddr>` becomes `Vec<IpAddr>`.
pub fn simplify_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment_start = 0usize;

    for ch in full.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            out.push(ch);
        } else if ch == ':' {
            // The identifier just pushed was a path segment.
            out.truncate(segment_start);
        } else {
            out.push(ch);
            segment_start = out.len();
        }
    }

    out
}

const POINTER_WRAPPERS: [&str; 3] = ["alloc::boxed::Box<", "alloc::sync::Arc<", "alloc::rc::Rc<"];

/// `std::any::type_name` with outer references and smart pointers removed.
pub(crate) fn rust_type_name<T: ?Sized>() -> &'static str {
    strip_indirection(std::any::type_name::<T>())
}

fn strip_indirection(mut name: &str) -> &str {
    loop {
        if let Some(rest) = name.strip_prefix("&mut ") {
            name = rest;
        } else if let Some(rest) = name.strip_prefix('&') {
            name = rest;
        } else if let Some(inner) = POINTER_WRAPPERS.iter().find_map(|wrapper| {
            name.strip_prefix(wrapper)
                .and_then(|rest| rest.strip_suffix('>'))
        }) {
            name = inner;
        } else {
            return name;
        }
    }
}
