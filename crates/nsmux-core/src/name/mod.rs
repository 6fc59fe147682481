//! Object names, namespace paths and name routing

mod object_name;
pub mod path;
pub mod pattern;
mod router;

pub use object_name::ObjectName;
pub use path::{
    concat_paths, domain_handler_name, handler_name, is_domain_handler_name, is_handler_name,
    namespace_of, normalize_domain, normalize_namespace_path, DOMAIN_HANDLER_TYPE,
    NAMESPACE_HANDLER_TYPE, NAMESPACE_SEPARATOR,
};
pub use pattern::wildcard_match;
pub use router::NameRouter;
