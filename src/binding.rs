//! Declarative accessors over a live configuration.
//!
//! A [`BindingTable`] maps method names to a property path and the context
//! variable each argument is bound to. A [`Binder`] executes calls against a
//! [`ConfigHandle`], so bound accessors always read the current snapshot.
//! The [`config_binding!`](crate::config_binding) macro generates a typed
//! struct on top of both:
//!
//! ```
//! use proptree::{ConfigHandle, config_binding};
//!
//! config_binding! {
//!     /// Accessors for the server section.
//!     pub struct Server {
//!         fn port() -> i32 = "server:port";
//!         fn mode(x: i32 as "x") -> String = "mode";
//!     }
//! }
//!
//! fn read(handle: ConfigHandle) -> proptree::error::Result<(i32, String)> {
//!     let server = Server::bind(handle);
//!     Ok((server.port()?, server.mode(2)?))
//! }
//! ```
//!
//! A method declared without a path fails with [`ProptreeError::Binding`];
//! a bound path that resolves to nothing fails with
//! [`ProptreeError::PropertyNotFound`].

use std::collections::HashMap;
use std::sync::Arc;

use crate::configuration::PropertySource;
use crate::context::ContextMap;
use crate::error::{ProptreeError, Result};
use crate::handle::ConfigHandle;
use crate::value::{FromValue, Value};

/// A method argument bound to a context variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamBinding {
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBinding {
    pub path: Option<String>,
    pub params: Vec<ParamBinding>,
}

/// Method name to binding.
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    methods: HashMap<String, MethodBinding>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `method`. A `None` path leaves it unbound.
    pub fn method(mut self, method: &str, path: Option<&str>, params: &[&str]) -> Self {
        let binding = MethodBinding {
            path: path.map(str::to_string),
            params: params
                .iter()
                .map(|context| ParamBinding {
                    context: context.to_string(),
                })
                .collect(),
        };
        self.methods.insert(method.to_string(), binding);
        self
    }

    pub fn get(&self, method: &str) -> Option<&MethodBinding> {
        self.methods.get(method)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Executes bound calls against a live configuration.
#[derive(Debug, Clone)]
pub struct Binder {
    handle: ConfigHandle,
    table: Arc<BindingTable>,
}

impl Binder {
    pub fn new(handle: ConfigHandle, table: impl Into<Arc<BindingTable>>) -> Self {
        Self {
            handle,
            table: table.into(),
        }
    }

    pub fn handle(&self) -> &ConfigHandle {
        &self.handle
    }

    pub fn table(&self) -> &BindingTable {
        &self.table
    }

    /// Resolve `method`'s path with a context built from `args`, positionally
    /// matched to the declared parameters.
    pub fn call<T: FromValue>(&self, method: &str, args: Vec<Value>) -> Result<T> {
        let binding = self
            .table
            .get(method)
            .ok_or_else(|| ProptreeError::Binding(format!("method '{method}' is not declared")))?;
        let path = binding.path.as_deref().ok_or_else(|| {
            ProptreeError::Binding(format!("method '{method}' is not bound to a property"))
        })?;
        if args.len() != binding.params.len() {
            return Err(ProptreeError::Binding(format!(
                "method '{method}' takes {} arguments, got {}",
                binding.params.len(),
                args.len()
            )));
        }

        let ctx: ContextMap = binding
            .params
            .iter()
            .map(|param| param.context.clone())
            .zip(args)
            .collect();
        self.handle
            .get_with::<T>(&ctx, path)?
            .ok_or_else(|| ProptreeError::PropertyNotFound {
                path: path.to_string(),
                configuration: self.handle.name(),
            })
    }
}

/// Generate a struct whose methods resolve configuration paths.
///
/// Each method is `fn name(arg: Type as "context", ...) -> Return = "path";`.
/// Leaving out `= "path"` declares the method without binding it; calling it
/// is a [`ProptreeError::Binding`](crate::ProptreeError::Binding).
#[macro_export]
macro_rules! config_binding {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                fn $method:ident ( $($arg:ident : $arg_ty:ty as $ctx:literal),* $(,)? ) -> $ret:ty $(= $path:literal)? ;
            )*
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            binder: $crate::Binder,
        }

        impl $name {
            /// The binding table behind this type.
            pub fn table() -> $crate::BindingTable {
                $crate::BindingTable::new()
                $(
                    .method(
                        stringify!($method),
                        {
                            #[allow(unused_mut)]
                            let mut path: ::core::option::Option<&str> = ::core::option::Option::None;
                            $( path = ::core::option::Option::Some($path); )?
                            path
                        },
                        &[$($ctx),*],
                    )
                )*
            }

            pub fn bind(handle: $crate::ConfigHandle) -> Self {
                Self {
                    binder: $crate::Binder::new(handle, Self::table()),
                }
            }

            pub fn binder(&self) -> &$crate::Binder {
                &self.binder
            }

            $(
                pub fn $method(&self $(, $arg: $arg_ty)*) -> $crate::error::Result<$ret> {
                    self.binder.call(
                        stringify!($method),
                        ::std::vec![$($crate::Value::from($arg)),*],
                    )
                }
            )*
        }
    };
}
