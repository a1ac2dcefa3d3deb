//! Turns an endpoint descriptor and an argument list into a [`ConcreteRequest`].

use crate::{
    descriptor::{BodyEncoding, EndpointDescriptor, ParamRole, ParameterBinding},
    request::{parse_header, upsert},
    ConcreteRequest, Error, Part, RequestBody, Result,
};
use http::{header::CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;
use url::Url;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Materializes requests relative to a base URL.
///
/// Bindings are applied in declaration order. For every accumulator (query,
/// fields, headers, parts) the binding declared last wins for a given key,
/// and a replaced key keeps its original position.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    base_url: Url,
    default_headers: HeaderMap,
}

impl RequestBuilder {
    /// Creates a builder for `base_url` that applies `default_headers` before
    /// anything else.
    pub fn new(base_url: Url, default_headers: HeaderMap) -> Self {
        Self {
            base_url,
            default_headers,
        }
    }

    /// The base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds the request for one invocation of `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] when the argument count differs
    /// from the binding count, a `Path` argument is null, a map role receives
    /// something other than an object, or a header is invalid. Returns
    /// [`Error::InvalidUrl`] when the resulting URL cannot be parsed.
    pub fn build(
        &self,
        descriptor: &EndpointDescriptor,
        args: &[Value],
    ) -> Result<ConcreteRequest> {
        if args.len() != descriptor.bindings.len() {
            return Err(Error::ConfigurationError(format!(
                "endpoint `{}` expects {} arguments, got {}",
                descriptor.name,
                descriptor.bindings.len(),
                args.len()
            )));
        }

        let (template, static_query) = match descriptor.path_template.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (descriptor.path_template.as_str(), None),
        };

        let mut acc = Accumulator {
            path: template.to_string(),
            headers: self.default_headers.clone(),
            ..Accumulator::default()
        };
        for (name, value) in &descriptor.static_headers {
            let (name, value) = parse_header(name, value)?;
            acc.headers.insert(name, value);
        }

        for (binding, arg) in descriptor.bindings.iter().zip(args) {
            acc.apply(descriptor, binding, arg)?;
        }

        let url = match &acc.url_override {
            Some(url) => self.base_url.join(url)?,
            None => self.join_path(&acc.path),
        };

        let mut request = ConcreteRequest::new(descriptor.method.clone(), url);
        if let (None, Some(query)) = (&acc.url_override, static_query) {
            for pair in query.split('&').filter(|pair| !pair.is_empty()) {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                request = request.with_encoded_query(key.to_string(), value.to_string());
            }
        }
        for (key, value) in acc.query {
            request = request.with_encoded_query(key, value);
        }
        for (name, value) in &acc.headers {
            request = request.with_header_value(name.clone(), value.clone());
        }

        let body = match descriptor.body_encoding {
            BodyEncoding::FormUrlEncoded if !acc.fields.is_empty() => {
                if !request.headers().contains_key(CONTENT_TYPE) {
                    request = request.with_header_value(
                        CONTENT_TYPE,
                        HeaderValue::from_static(FORM_CONTENT_TYPE),
                    );
                }
                RequestBody::Form(acc.fields)
            }
            BodyEncoding::Multipart if !acc.parts.is_empty() => RequestBody::Multipart(acc.parts),
            _ => acc.body,
        };

        Ok(request.with_body(body))
    }

    fn join_path(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let base = url.path().trim_end_matches('/');
        let joined = if path.is_empty() {
            format!("{base}/")
        } else if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        };
        url.set_path(&joined);
        url
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    path: String,
    query: Vec<(String, String)>,
    fields: Vec<(String, String)>,
    headers: HeaderMap,
    parts: Vec<Part>,
    body: RequestBody,
    url_override: Option<String>,
}

impl Accumulator {
    fn apply(
        &mut self,
        descriptor: &EndpointDescriptor,
        binding: &ParameterBinding,
        arg: &Value,
    ) -> Result<()> {
        match binding.role {
            ParamRole::Path => {
                if arg.is_null() {
                    return Err(Error::ConfigurationError(format!(
                        "endpoint `{}`: path argument `{}` is null",
                        descriptor.name, binding.key
                    )));
                }
                let value = encode(binding, &display(arg));
                self.path = self.path.replacen(&format!("{{{}}}", binding.key), &value, 1);
            }
            ParamRole::Query => {
                if !arg.is_null() {
                    self.add_query(binding, &binding.key, arg);
                }
            }
            ParamRole::QueryMap => {
                for (key, value) in entries(descriptor, binding, arg)? {
                    self.add_query(binding, key, value);
                }
            }
            ParamRole::Field => {
                if !arg.is_null() {
                    self.add_field(binding, &binding.key, arg);
                }
            }
            ParamRole::FieldMap => {
                for (key, value) in entries(descriptor, binding, arg)? {
                    self.add_field(binding, key, value);
                }
            }
            ParamRole::Header => {
                if !arg.is_null() {
                    self.add_header(&binding.key, arg)?;
                }
            }
            ParamRole::HeaderMap => {
                for (key, value) in entries(descriptor, binding, arg)? {
                    self.add_header(key, value)?;
                }
            }
            ParamRole::Part => {
                if !arg.is_null() {
                    self.add_part(binding, &binding.key, arg);
                }
            }
            ParamRole::PartMap => {
                for (key, value) in entries(descriptor, binding, arg)? {
                    self.add_part(binding, key, value);
                }
            }
            ParamRole::Body => {
                self.body = match arg {
                    Value::Null => RequestBody::Empty,
                    value => RequestBody::Json(value.clone()),
                };
            }
            ParamRole::Url => {
                if !arg.is_null() {
                    self.url_override = Some(display(arg));
                }
            }
        }
        Ok(())
    }

    fn add_query(&mut self, binding: &ParameterBinding, key: &str, value: &Value) {
        upsert(
            &mut self.query,
            encode(binding, key),
            encode(binding, &display(value)),
        );
    }

    fn add_field(&mut self, binding: &ParameterBinding, key: &str, value: &Value) {
        // Form bodies are encoded by the transport.
        upsert(
            &mut self.fields,
            decode(binding, key),
            decode(binding, &display(value)),
        );
    }

    fn add_header(&mut self, name: &str, value: &Value) -> Result<()> {
        let (name, value) = parse_header(name, &display(value))?;
        self.headers.insert(name, value);
        Ok(())
    }

    fn add_part(&mut self, binding: &ParameterBinding, name: &str, value: &Value) {
        let content_type = binding.content_type.clone().unwrap_or_else(|| {
            match value {
                Value::String(_) => "text/plain",
                _ => "application/json",
            }
            .to_string()
        });
        let part = Part {
            name: name.to_string(),
            content_type,
            bytes: display(value).into(),
        };
        match self.parts.iter_mut().find(|p| p.name == part.name) {
            Some(slot) => *slot = part,
            None => self.parts.push(part),
        }
    }
}

/// Non-null entries of a map argument. A null argument yields nothing.
fn entries<'v>(
    descriptor: &EndpointDescriptor,
    binding: &ParameterBinding,
    arg: &'v Value,
) -> Result<impl Iterator<Item = (&'v String, &'v Value)>> {
    let map = match arg {
        Value::Object(map) => Some(map),
        Value::Null => None,
        other => {
            return Err(Error::ConfigurationError(format!(
                "endpoint `{}`: {:?} argument must be an object, got {other}",
                descriptor.name, binding.role
            )))
        }
    };
    Ok(map
        .into_iter()
        .flatten()
        .filter(|(_, value)| !value.is_null()))
}

/// Renders an argument: strings as-is, everything else as JSON text.
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn encode(binding: &ParameterBinding, raw: &str) -> String {
    if binding.encoded {
        raw.to_string()
    } else {
        urlencoding::encode(raw).into_owned()
    }
}

fn decode(binding: &ParameterBinding, raw: &str) -> String {
    if binding.encoded {
        urlencoding::decode(raw)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| raw.to_string())
    } else {
        raw.to_string()
    }
}
