//! Bare HTML for the page routes. Styling is out of scope.

use axum::response::Html;

use crate::error::FieldErrors;
use crate::movies::{dto::MoviePage, repo_types::Movie};

pub(crate) fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html lang=\"en\"><head><meta charset=\"utf-8\">\
         <title>{}</title></head><body>\n{}\n</body></html>",
        escape(title),
        body
    ))
}

fn field_error(errors: &FieldErrors, name: &str) -> String {
    errors
        .get(name)
        .map(|m| format!("<p class=\"error\" data-field=\"{name}\">{}</p>", escape(m)))
        .unwrap_or_default()
}

pub fn movie_list(page: &MoviePage, limit: i64) -> Html<String> {
    let mut body = String::from(
        "<header><h1>My movies</h1>\
         <a href=\"/movies/create\">Add a new movie</a>\
         <form method=\"post\" action=\"/sign-out\"><button>Logout</button></form></header>\n",
    );

    if page.total_records == 0 {
        body.push_str("<p>Your movie list is empty</p>\n");
    } else if page.movies.is_empty() {
        body.push_str(&format!(
            "<p>No movies on page {}. <a href=\"/?page={last}&amp;limit={limit}\">Go to page {last}</a></p>\n",
            page.current_page,
            last = page.total_pages,
        ));
    } else {
        body.push_str("<ul class=\"movies\">\n");
        for m in &page.movies {
            body.push_str(&format!(
                "<li><a href=\"/movies/edit/{id}\"><img src=\"{poster}\" alt=\"{title}\">\
                 <span>{title}</span> <span>{year}</span></a></li>\n",
                id = m.id,
                poster = escape(&m.poster),
                title = escape(&m.title),
                year = m.year,
            ));
        }
        body.push_str("</ul>\n");
    }

    if page.total_pages > 1 && page.current_page <= page.total_pages {
        body.push_str("<nav class=\"pagination\">");
        if page.current_page > 1 {
            body.push_str(&format!(
                "<a href=\"/?page={}&amp;limit={limit}\">Prev</a>",
                page.current_page - 1
            ));
        }
        body.push_str(&format!(
            " <span>{} / {}</span> ",
            page.current_page, page.total_pages
        ));
        if page.current_page < page.total_pages {
            body.push_str(&format!(
                "<a href=\"/?page={}&amp;limit={limit}\">Next</a>",
                page.current_page + 1
            ));
        }
        body.push_str("</nav>\n");
    }

    layout("My movies", &body)
}

/// Values echoed back into the inputs after a failed submit.
#[derive(Default)]
pub struct MovieFormValues {
    pub title: String,
    pub year: String,
    pub file_url: String,
}

impl From<&Movie> for MovieFormValues {
    fn from(m: &Movie) -> Self {
        Self {
            title: m.title.clone(),
            year: m.year.to_string(),
            file_url: m.poster.clone(),
        }
    }
}

pub fn movie_form(
    heading: &str,
    action: &str,
    values: &MovieFormValues,
    errors: &FieldErrors,
    delete_action: Option<&str>,
) -> Html<String> {
    let preview = if values.file_url.is_empty() {
        String::new()
    } else {
        format!(
            "<img src=\"{0}\" alt=\"poster\"><input type=\"hidden\" name=\"fileUrl\" value=\"{0}\">",
            escape(&values.file_url)
        )
    };
    let mut body = format!(
        "<h1>{heading}</h1>\n\
         <form method=\"post\" action=\"{action}\" enctype=\"multipart/form-data\">\n\
         {preview}<input type=\"file\" name=\"file\" accept=\"image/*\">{file_err}\n\
         <input type=\"text\" name=\"title\" placeholder=\"Title\" value=\"{title}\">{title_err}\n\
         <input type=\"number\" name=\"year\" placeholder=\"Publishing year\" value=\"{year}\">{year_err}\n\
         <a href=\"/\">Cancel</a> <button type=\"submit\">Submit</button>\n</form>\n",
        heading = escape(heading),
        action = escape(action),
        preview = preview,
        file_err = field_error(errors, "file"),
        title = escape(&values.title),
        title_err = field_error(errors, "title"),
        year = escape(&values.year),
        year_err = field_error(errors, "year"),
    );
    if let Some(delete_action) = delete_action {
        body.push_str(&format!(
            "<form method=\"post\" action=\"{}\"><button>Delete</button></form>\n",
            escape(delete_action)
        ));
    }
    layout(heading, &body)
}

pub fn sign_in(email: &str, error: Option<&str>) -> Html<String> {
    let error = error
        .map(|e| format!("<p class=\"error\">{}</p>", escape(e)))
        .unwrap_or_default();
    let body = format!(
        "<h1>Sign in</h1>\n{error}\
         <form method=\"post\" action=\"/sign-in\">\n\
         <input type=\"email\" name=\"email\" placeholder=\"Email\" value=\"{}\">\n\
         <input type=\"password\" name=\"password\" placeholder=\"Password\">\n\
         <button type=\"submit\">Login</button>\n</form>\n\
         <a href=\"/sign-up\">Create an account</a>\n",
        escape(email)
    );
    layout("Sign in", &body)
}

pub fn sign_up(email: &str, errors: &FieldErrors) -> Html<String> {
    let body = format!(
        "<h1>Sign up</h1>\n\
         <form method=\"post\" action=\"/sign-up\">\n\
         <input type=\"email\" name=\"email\" placeholder=\"Email\" value=\"{}\">{}\n\
         <input type=\"password\" name=\"password\" placeholder=\"Password\">{}\n\
         <input type=\"password\" name=\"confirmPassword\" placeholder=\"Confirm password\">{}\n\
         <button type=\"submit\">Sign up</button>\n</form>\n\
         <a href=\"/sign-in\">Already have an account?</a>\n",
        escape(email),
        field_error(errors, "email"),
        field_error(errors, "password"),
        field_error(errors, "confirmPassword"),
    );
    layout("Sign up", &body)
}
