//! Callback page components.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use leptos::prelude::*;
use std::time::Duration;
use varekatalog_auth::{CallbackError, PostLoginRedirect};

/// Renders the settled outcome of a login callback.
pub fn render(outcome: &Result<PostLoginRedirect, CallbackError>) -> Response {
    match outcome {
        Ok(redirect) => {
            let target = redirect.target.clone();
            let refresh = format!(
                "{}; url={}",
                refresh_seconds(redirect.delay),
                redirect.target
            );
            let page = to_document(move || {
                view! { <SignedInPage target=target refresh=refresh/> }
            });
            (StatusCode::OK, Html(page)).into_response()
        }
        Err(error) => {
            let message = error.to_string();
            let page = to_document(move || view! { <LoginFailedPage message=message/> });
            (status_for(error), Html(page)).into_response()
        }
    }
}

/// Meta refresh takes whole seconds; never redirect early.
fn refresh_seconds(delay: Duration) -> u128 {
    delay.as_millis().div_ceil(1000)
}

fn status_for(error: &CallbackError) -> StatusCode {
    match error {
        CallbackError::TokenExchange { .. } => StatusCode::BAD_GATEWAY,
        CallbackError::Provider { .. }
        | CallbackError::MissingCode
        | CallbackError::StateMismatch
        | CallbackError::MissingVerifier => StatusCode::BAD_REQUEST,
    }
}

fn to_document<V: IntoView>(page: impl FnOnce() -> V) -> String {
    Owner::new().with(|| page().to_html())
}

/// Shown after a successful login until the browser follows the refresh.
#[component]
fn SignedInPage(target: String, refresh: String) -> impl IntoView {
    view! {
        <!DOCTYPE html>
        <html lang="nb">
            <head>
                <meta charset="utf-8"/>
                <meta http-equiv="refresh" content=refresh/>
                <title>"Innlogget"</title>
            </head>
            <body>
                <main class="callback-page">
                    <p>"Du er logget inn."</p>
                    <p><a href=target>"Gå videre"</a></p>
                </main>
            </body>
        </html>
    }
}

#[component]
fn LoginFailedPage(message: String) -> impl IntoView {
    view! {
        <!DOCTYPE html>
        <html lang="nb">
            <head>
                <meta charset="utf-8"/>
                <title>"Innlogging feilet"</title>
            </head>
            <body>
                <main class="callback-page">
                    <p role="alert">{message}</p>
                    <p><a href="/auth/login" rel="external">"Prøv igjen"</a></p>
                </main>
            </body>
        </html>
    }
}
