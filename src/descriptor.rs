//! Declarative endpoint descriptions.
//!
//! An [`EndpointDescriptor`] is the static metadata of one remote operation:
//! its method, path template, static headers and the role of each positional
//! argument. Descriptors are built once at setup, validated, and then shared
//! read-only by every call to that endpoint.

use crate::{Error, Result};
use http::Method;
use std::time::Duration;

/// How a positional argument contributes to the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamRole {
    /// Substitutes a `{key}` placeholder in the path template.
    Path,
    /// A single query parameter.
    Query,
    /// An object whose entries become query parameters.
    QueryMap,
    /// The logical request body.
    Body,
    /// A single form field.
    Field,
    /// An object whose entries become form fields.
    FieldMap,
    /// A single header.
    Header,
    /// An object whose entries become headers.
    HeaderMap,
    /// A single multipart part.
    Part,
    /// An object whose entries become multipart parts.
    PartMap,
    /// Replaces the computed URL entirely.
    Url,
}

/// Binds one positional argument to a role in the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterBinding {
    /// The role of the argument.
    pub role: ParamRole,
    /// Placeholder, parameter, field, header or part name. Empty for map
    /// roles, `Body` and `Url`.
    pub key: String,
    /// Whether the value is already percent-encoded.
    pub encoded: bool,
    /// Content type for `Part`/`PartMap` values.
    pub content_type: Option<String>,
}

impl ParameterBinding {
    fn new(role: ParamRole, key: impl Into<String>) -> Self {
        Self {
            role,
            key: key.into(),
            encoded: false,
            content_type: None,
        }
    }

    /// A `{key}` path substitution.
    pub fn path(key: impl Into<String>) -> Self {
        Self::new(ParamRole::Path, key)
    }

    /// A single query parameter.
    pub fn query(key: impl Into<String>) -> Self {
        Self::new(ParamRole::Query, key)
    }

    /// A map of query parameters.
    pub fn query_map() -> Self {
        Self::new(ParamRole::QueryMap, "")
    }

    /// The request body.
    pub fn body() -> Self {
        Self::new(ParamRole::Body, "")
    }

    /// A single form field.
    pub fn field(key: impl Into<String>) -> Self {
        Self::new(ParamRole::Field, key)
    }

    /// A map of form fields.
    pub fn field_map() -> Self {
        Self::new(ParamRole::FieldMap, "")
    }

    /// A single header.
    pub fn header(key: impl Into<String>) -> Self {
        Self::new(ParamRole::Header, key)
    }

    /// A map of headers.
    pub fn header_map() -> Self {
        Self::new(ParamRole::HeaderMap, "")
    }

    /// A single multipart part.
    pub fn part(key: impl Into<String>) -> Self {
        Self::new(ParamRole::Part, key)
    }

    /// A map of multipart parts.
    pub fn part_map() -> Self {
        Self::new(ParamRole::PartMap, "")
    }

    /// A full URL replacing the computed one.
    pub fn url() -> Self {
        Self::new(ParamRole::Url, "")
    }

    /// Marks the value as already percent-encoded.
    #[must_use]
    pub fn encoded(mut self) -> Self {
        self.encoded = true;
        self
    }

    /// Sets the content type of a part.
    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// How the request body is assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyEncoding {
    /// No special encoding; a `Body` binding is handed to the request converter.
    #[default]
    None,
    /// The `Body` binding is encoded as JSON by the request converter.
    Json,
    /// `Field`/`FieldMap` values are sent as `application/x-www-form-urlencoded`.
    FormUrlEncoded,
    /// `Part`/`PartMap` values are sent as `multipart/form-data`.
    Multipart,
}

/// Describes the shape expected from a successful response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseTypeHint {
    /// Name of a type registered with the [`ObjectHydrator`](crate::ObjectHydrator).
    pub type_name: String,
    /// Whether the body is a sequence of that type.
    pub is_array: bool,
}

impl ResponseTypeHint {
    /// A single object of `type_name`.
    pub fn object(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            is_array: false,
        }
    }

    /// A sequence of `type_name` objects.
    pub fn array(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            is_array: true,
        }
    }
}

/// Static metadata for one remote operation.
///
/// # Examples
///
/// ```
/// use wirecall::descriptor::{EndpointDescriptor, ParameterBinding};
/// use http::Method;
///
/// let endpoint = EndpointDescriptor::builder("get_user", Method::GET, "/users/{id}")
///     .binding(ParameterBinding::path("id"))
///     .binding(ParameterBinding::query("expand"))
///     .build()
///     .unwrap();
///
/// assert_eq!(endpoint.bindings.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct EndpointDescriptor {
    /// The name used with [`Client::invoke`](crate::Client::invoke).
    pub name: String,
    /// The HTTP method.
    pub method: Method,
    /// Path relative to the base URL, with `{name}` placeholders.
    pub path_template: String,
    /// Headers sent with every call, as `(name, value)` pairs.
    pub static_headers: Vec<(String, String)>,
    /// One binding per positional argument, in declaration order.
    pub bindings: Vec<ParameterBinding>,
    /// How the body is assembled.
    pub body_encoding: BodyEncoding,
    /// Overrides the cache policy TTL for this endpoint.
    pub cache_ttl: Option<Duration>,
    /// Drives hydration of the response body.
    pub response_type: Option<ResponseTypeHint>,
    /// Registered type of the `Body` argument, mapped to wire shape on the way out.
    pub body_type: Option<String>,
}

impl EndpointDescriptor {
    /// Starts building a descriptor.
    pub fn builder(
        name: impl Into<String>,
        method: Method,
        path_template: impl Into<String>,
    ) -> EndpointDescriptorBuilder {
        EndpointDescriptorBuilder {
            descriptor: EndpointDescriptor {
                name: name.into(),
                method,
                path_template: path_template.into(),
                static_headers: Vec::new(),
                bindings: Vec::new(),
                body_encoding: BodyEncoding::None,
                cache_ttl: None,
                response_type: None,
                body_type: None,
            },
        }
    }

    /// Checks the descriptor for setup-time configuration errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] for a duplicate `Body` or `Url`
    /// binding, a `Path` binding without a matching placeholder, a placeholder
    /// no `Path` binding resolves, a placeholder in the template's query
    /// string, or roles that contradict the body encoding.
    pub fn validate(&self) -> Result<()> {
        let count = |role: ParamRole| self.bindings.iter().filter(|b| b.role == role).count();

        if count(ParamRole::Body) > 1 {
            return Err(self.config_error("multiple Body bindings"));
        }
        if count(ParamRole::Url) > 1 {
            return Err(self.config_error("multiple Url bindings"));
        }

        let (path, query) = match self.path_template.split_once('?') {
            Some((path, query)) => (path, query),
            None => (self.path_template.as_str(), ""),
        };
        if let Some(name) = placeholders(query).first() {
            return Err(self.config_error(&format!(
                "placeholder `{{{name}}}` in the query string; use a Query binding instead"
            )));
        }

        let placeholders = placeholders(path);
        for binding in self.bindings.iter().filter(|b| b.role == ParamRole::Path) {
            if !placeholders.contains(&binding.key.as_str()) {
                return Err(self.config_error(&format!(
                    "Path binding `{}` has no matching `{{{}}}` placeholder",
                    binding.key, binding.key
                )));
            }
        }
        for name in &placeholders {
            let occurrences = placeholders.iter().filter(|p| *p == name).count();
            let bound = self
                .bindings
                .iter()
                .filter(|b| b.role == ParamRole::Path && b.key == *name)
                .count();
            if bound < occurrences {
                return Err(self.config_error(&format!("unresolved path placeholder `{{{name}}}`")));
            }
        }

        let has_fields = count(ParamRole::Field) + count(ParamRole::FieldMap) > 0;
        let has_parts = count(ParamRole::Part) + count(ParamRole::PartMap) > 0;
        match self.body_encoding {
            BodyEncoding::FormUrlEncoded if count(ParamRole::Body) > 0 => {
                Err(self.config_error("Body binding cannot be combined with form encoding"))
            }
            BodyEncoding::Multipart if count(ParamRole::Body) > 0 => {
                Err(self.config_error("Body binding cannot be combined with multipart encoding"))
            }
            encoding if has_fields && encoding != BodyEncoding::FormUrlEncoded => {
                Err(self.config_error("Field bindings require form encoding"))
            }
            encoding if has_parts && encoding != BodyEncoding::Multipart => {
                Err(self.config_error("Part bindings require multipart encoding"))
            }
            _ => Ok(()),
        }
    }

    fn config_error(&self, detail: &str) -> Error {
        Error::ConfigurationError(format!("endpoint `{}`: {detail}", self.name))
    }
}

/// Builder for [`EndpointDescriptor`].
#[derive(Debug, Clone)]
pub struct EndpointDescriptorBuilder {
    descriptor: EndpointDescriptor,
}

impl EndpointDescriptorBuilder {
    /// Adds a static header sent with every call.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.descriptor
            .static_headers
            .push((name.into(), value.into()));
        self
    }

    /// Appends the binding for the next positional argument.
    pub fn binding(mut self, binding: ParameterBinding) -> Self {
        self.descriptor.bindings.push(binding);
        self
    }

    /// Sets how the body is assembled.
    pub fn body_encoding(mut self, encoding: BodyEncoding) -> Self {
        self.descriptor.body_encoding = encoding;
        self
    }

    /// Shorthand for [`BodyEncoding::FormUrlEncoded`].
    pub fn form_url_encoded(self) -> Self {
        self.body_encoding(BodyEncoding::FormUrlEncoded)
    }

    /// Shorthand for [`BodyEncoding::Multipart`].
    pub fn multipart(self) -> Self {
        self.body_encoding(BodyEncoding::Multipart)
    }

    /// Caches successful responses of this endpoint for `ttl`.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.descriptor.cache_ttl = Some(ttl);
        self
    }

    /// Hydrates the response body as the given type.
    pub fn response_type(mut self, hint: ResponseTypeHint) -> Self {
        self.descriptor.response_type = Some(hint);
        self
    }

    /// Maps the `Body` argument to wire shape as the given type.
    pub fn body_type(mut self, type_name: impl Into<String>) -> Self {
        self.descriptor.body_type = Some(type_name.into());
        self
    }

    /// Validates and returns the descriptor.
    ///
    /// # Errors
    ///
    /// See [`EndpointDescriptor::validate`].
    pub fn build(self) -> Result<EndpointDescriptor> {
        self.descriptor.validate()?;
        Ok(self.descriptor)
    }
}

/// Returns the `{name}` placeholders of a template in order of appearance.
pub(crate) fn placeholders(template: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            break;
        };
        let name = &after[..close];
        if !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            found.push(name);
        }
        rest = &after[close + 1..];
    }
    found
}
