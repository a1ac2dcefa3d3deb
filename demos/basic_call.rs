//! Basic example demonstrating declared endpoints and hydrated responses.
//!
//! This example shows how to:
//! - Declare endpoints with path, query and body bindings
//! - Map renamed wire keys with an object hydrator
//! - Invoke endpoints by name and read typed data
//! - Access response metadata
//!
//! Run with: `cargo run --example basic_call`

use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use wirecall::descriptor::{EndpointDescriptor, ParameterBinding, ResponseTypeHint};
use wirecall::hydrate::{FieldDescriptor, TypeDescriptor};
use wirecall::interceptor::LoggingInterceptor;
use wirecall::{Client, Error, ObjectHydrator};

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct NewPost {
    title: String,
    body: String,
    user_id: u32,
}

fn post_type() -> TypeDescriptor {
    TypeDescriptor::new("Post")
        .field(FieldDescriptor::scalar("user_id").renamed("userId"))
        .field(FieldDescriptor::scalar("id"))
        .field(FieldDescriptor::scalar("title"))
        .field(FieldDescriptor::scalar("body").with_default(json!("")))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter("wirecall=debug,basic_call=info")
        .init();

    // Declare the JSONPlaceholder endpoints once
    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .interceptor(LoggingInterceptor)
        .hydrator(ObjectHydrator::new().register(post_type()))
        .endpoint(
            EndpointDescriptor::builder("get_post", Method::GET, "/posts/{id}")
                .binding(ParameterBinding::path("id"))
                .response_type(ResponseTypeHint::object("Post"))
                .build()?,
        )
        .endpoint(
            EndpointDescriptor::builder("list_posts", Method::GET, "/posts")
                .binding(ParameterBinding::query("userId"))
                .response_type(ResponseTypeHint::array("Post"))
                .build()?,
        )
        .endpoint(
            EndpointDescriptor::builder("create_post", Method::POST, "/posts")
                .binding(ParameterBinding::body())
                .body_type("Post")
                .response_type(ResponseTypeHint::object("Post"))
                .build()?,
        )
        .build()?;

    println!("=== GET Request Example ===");
    let response = client.call::<Post>("get_post", vec![json!(1)]).await?;

    println!("Post ID: {}", response.data.id);
    println!("Author: {}", response.data.user_id);
    println!("Title: {}", response.data.title);
    println!("Request latency: {:?}", response.latency);
    println!("Status code: {}", response.status);
    println!();

    println!("=== Query Example ===");
    let posts = client.call::<Vec<Post>>("list_posts", vec![json!(2)]).await?;
    println!("User 2 wrote {} posts", posts.data.len());
    println!();

    println!("=== POST Request Example ===");
    let new_post = NewPost {
        title: "My New Post".to_string(),
        body: "This is the content of my new post!".to_string(),
        user_id: 1,
    };
    let body = serde_json::to_value(&new_post)
        .map_err(|e| Error::SerializationFailed(e.to_string()))?;

    let response = client.call::<Post>("create_post", vec![body]).await?;

    println!("Created post ID: {}", response.data.id);
    println!("Title: {}", response.data.title);
    println!();

    println!("=== Accessing Response Metadata ===");
    println!("Raw response length: {} bytes", response.raw_body.len());
    println!("Content-Type: {:?}", response.header("content-type"));
    println!("Was retried: {}", response.was_retried());

    Ok(())
}
