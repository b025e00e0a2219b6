//! Server-rendered HTML pages for both surfaces

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use std::fmt::Write as _;
use triage_common::review::{Rating, Review, MIN_REVIEW_CHARS};
use triage_common::view::pagination::PAGE_SIZE_CHOICES;
use triage_common::view::{ReviewView, SortKey, TimeWindow};

use super::query::{ViewQuery, FORM_MARKER};
use super::reviews::load_view;
use super::submit::Submission;
use crate::AppState;

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; max-width: 1100px; margin: 0 auto; padding: 1.5rem; color: #222; }
h1 { margin-bottom: 0.25rem; }
.muted { color: #666; }
.error { background: #fdecea; border: 1px solid #f5c2c0; padding: 0.75rem 1rem; border-radius: 8px; }
.notice { background: #fff8e1; border: 1px solid #ffe08a; padding: 0.75rem 1rem; border-radius: 8px; }
.success-box { background: #d4edda; border: 1px solid #c3e6cb; padding: 1.25rem; border-radius: 10px; }
.ai-response { background: #e3f2fd; border-left: 4px solid #2196F3; padding: 1.25rem; border-radius: 10px; margin-top: 1rem; }
.cards { display: flex; flex-wrap: wrap; gap: 0.75rem; margin: 1rem 0; }
.card { border: 1px solid #ddd; border-radius: 8px; padding: 0.75rem 1rem; min-width: 120px; }
.card .value { font-size: 1.6rem; font-weight: 600; }
.review { border: 1px solid #ddd; border-left-width: 6px; border-radius: 8px; padding: 0.75rem 1rem; margin: 0.75rem 0; }
.review pre { white-space: pre-wrap; font-family: inherit; margin: 0.25rem 0; }
form.inline { display: inline; }
fieldset { border: 1px solid #ddd; border-radius: 8px; }
table { border-collapse: collapse; }
td, th { padding: 0.2rem 0.6rem; text-align: left; }
.bar { background: #90caf9; height: 0.8rem; }
textarea { width: 100%; min-height: 8rem; }
button { padding: 0.5rem 1rem; }
"#;

/// Escape text for HTML element content and attribute values
pub fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n<style>{}</style>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        html_escape(title),
        STYLE,
        body
    )
}

fn stars(rating: Rating) -> String {
    "⭐".repeat(rating.value() as usize)
}

// =============================================================================
// Customer surface
// =============================================================================

/// Submission form, optionally with a validation message and the previous input
pub fn render_submission_form(error: Option<&str>, rating: Option<i64>, review: &str) -> String {
    let mut body = String::new();
    body.push_str("<h1>⭐ Share Your Experience</h1>\n");
    body.push_str("<p class=\"muted\">We value your feedback! Please rate your experience and share your thoughts.</p>\n");

    if let Some(error) = error {
        let _ = writeln!(body, "<p class=\"error\">{}</p>", html_escape(error));
    }

    body.push_str("<form method=\"post\" action=\"/submit\">\n<fieldset>\n<legend>Your rating</legend>\n");
    let selected = rating.unwrap_or(5);
    for r in Rating::ALL.iter().rev() {
        let _ = writeln!(
            body,
            "<label><input type=\"radio\" name=\"rating\" value=\"{v}\"{checked}> {emoji} {stars} {label}</label><br>",
            v = r.value(),
            checked = if i64::from(r.value()) == selected { " checked" } else { "" },
            emoji = r.emoji(),
            stars = stars(*r),
            label = r.label(),
        );
    }
    body.push_str("</fieldset>\n");

    let _ = writeln!(
        body,
        "<p><label for=\"review\">Your review</label><br>\n\
         <textarea id=\"review\" name=\"review\" placeholder=\"Tell us about your experience (at least {} characters)\">{}</textarea></p>",
        MIN_REVIEW_CHARS,
        html_escape(review)
    );
    body.push_str("<button type=\"submit\">Submit Review</button>\n</form>\n");

    page("Leave Your Review", &body)
}

/// Confirmation after a stored submission
pub fn render_thank_you(submission: &Submission) -> String {
    let review = &submission.review;
    let mut body = String::new();
    body.push_str("<h1>⭐ Thank You!</h1>\n");
    let _ = writeln!(
        body,
        "<div class=\"success-box\">Your {} {} review has been submitted. {}</div>",
        stars(review.rating),
        review.rating.label(),
        review.rating.emoji()
    );

    if let Some(outcome) = &submission.enrichment {
        let _ = writeln!(
            body,
            "<div class=\"ai-response\"><strong>Our response</strong><p>{}</p></div>",
            html_escape(&outcome.enrichment.ai_response)
        );
    }

    body.push_str("<p><a href=\"/\">Submit another review</a></p>\n");
    page("Thank You", &body)
}

/// GET / on the customer surface
pub async fn submission_page() -> Html<String> {
    Html(render_submission_form(None, None, ""))
}

/// Plain page with one message and a link back
pub fn render_message(title: &str, message: &str, back_href: &str) -> String {
    let body = format!(
        "<h1>{}</h1>\n<p class=\"error\">{}</p>\n<p><a href=\"{}\">Back to dashboard</a></p>\n",
        html_escape(title),
        html_escape(message),
        html_escape(back_href)
    );
    page(title, &body)
}

// =============================================================================
// Admin dashboard
// =============================================================================

/// Inputs besides the view itself
pub struct DashboardContext {
    pub ai_enabled: bool,
    pub batch_running: bool,
}

fn select_options<T: Copy + PartialEq>(
    options: &[T],
    current: T,
    value: impl Fn(T) -> String,
    label: impl Fn(T) -> String,
) -> String {
    options
        .iter()
        .map(|o| {
            format!(
                "<option value=\"{}\"{}>{}</option>",
                html_escape(&value(*o)),
                if *o == current { " selected" } else { "" },
                html_escape(&label(*o))
            )
        })
        .collect()
}

fn render_filters(query: &ViewQuery) -> String {
    let p = &query.params;
    let mut html = String::new();
    html.push_str("<form method=\"get\" action=\"/\">\n<fieldset>\n<legend>Filters</legend>\n");
    let _ = writeln!(html, "<input type=\"hidden\" name=\"{}\" value=\"1\">", FORM_MARKER);
    if let Some(token) = &query.token {
        let _ = writeln!(html, "<input type=\"hidden\" name=\"token\" value=\"{}\">", html_escape(token));
    }

    let _ = writeln!(
        html,
        "<label>Time period <select name=\"window\">{}</select></label>",
        select_options(&TimeWindow::ALL, p.window, |w| w.as_str().to_string(), |w| w.label().to_string())
    );

    html.push_str("<span>Ratings ");
    for r in Rating::ALL {
        let _ = write!(
            html,
            "<label><input type=\"checkbox\" name=\"rating\" value=\"{v}\"{checked}>{v}⭐</label> ",
            v = r.value(),
            checked = if p.ratings.contains(r) { " checked" } else { "" }
        );
    }
    html.push_str("</span>\n");

    let _ = writeln!(
        html,
        "<label><input type=\"checkbox\" name=\"critical\" value=\"true\"{}> Critical only (≤2⭐)</label>",
        if p.critical_only { " checked" } else { "" }
    );

    let _ = writeln!(
        html,
        "<label>Sort <select name=\"sort\">{}</select></label>",
        select_options(&SortKey::ALL, p.sort, |s| s.as_str().to_string(), |s| s.label().to_string())
    );

    let mut sizes = PAGE_SIZE_CHOICES.to_vec();
    if !sizes.contains(&p.page_size) {
        sizes.push(p.page_size);
        sizes.sort_unstable();
    }
    let _ = writeln!(
        html,
        "<label>Per page <select name=\"per_page\">{}</select></label>",
        select_options(&sizes, p.page_size, |n| n.to_string(), |n| n.to_string())
    );

    html.push_str("<button type=\"submit\">Apply</button>\n</fieldset>\n</form>\n");
    html
}

fn render_metrics(view: &ReviewView) -> String {
    let m = &view.metrics;
    let mut html = String::new();
    html.push_str("<div class=\"cards\">\n");
    let cards = [
        ("Total Reviews", m.total.to_string()),
        ("Average Rating", format!("{} ⭐", m.average_label())),
        ("Critical (≤2⭐)", format!("{} ({:.1}%)", m.critical, m.critical_pct)),
        ("Neutral (3⭐)", format!("{} ({:.1}%)", m.neutral, m.neutral_pct)),
        ("Positive (≥4⭐)", format!("{} ({:.1}%)", m.positive, m.positive_pct)),
        ("Rating Trend", m.trend_label()),
        ("Pending AI", m.pending.to_string()),
    ];
    for (label, value) in cards {
        let _ = writeln!(
            html,
            "<div class=\"card\"><div class=\"muted\">{}</div><div class=\"value\">{}</div></div>",
            html_escape(label),
            html_escape(&value)
        );
    }
    html.push_str("</div>\n");

    html.push_str("<h3>Rating distribution</h3>\n<table>\n");
    for bucket in &m.distribution {
        let width = if m.total == 0 {
            0.0
        } else {
            bucket.count as f64 / m.total as f64 * 300.0
        };
        let _ = writeln!(
            html,
            "<tr><td>{}⭐</td><td>{}</td><td><div class=\"bar\" style=\"width: {:.0}px\"></div></td></tr>",
            bucket.rating, bucket.count, width
        );
    }
    html.push_str("</table>\n");

    if !m.daily.is_empty() {
        html.push_str("<h3>Reviews over time</h3>\n<table>\n<tr><th>Day</th><th>Reviews</th></tr>\n");
        for day in &m.daily {
            let _ = writeln!(html, "<tr><td>{}</td><td>{}</td></tr>", day.date, day.count);
        }
        html.push_str("</table>\n");
    }
    html
}

fn render_actions(query: &ViewQuery, view: &ReviewView, ctx: &DashboardContext) -> String {
    let qs = query.query_string(view.page);
    let mut html = String::new();
    let _ = writeln!(
        html,
        "<p>Export current view: <a href=\"/api/export/csv?{qs}\">CSV</a> · <a href=\"/api/export/json?{qs}\">JSON</a></p>",
        qs = html_escape(&qs)
    );

    if !ctx.ai_enabled {
        html.push_str("<p class=\"notice\">AI enrichment is disabled: no API key configured.</p>\n");
    } else if ctx.batch_running {
        html.push_str("<p class=\"notice\">An enrichment batch is running.</p>\n");
    } else if view.metrics.pending > 0 {
        let _ = writeln!(
            html,
            "<form class=\"inline\" method=\"post\" action=\"/enrich{}\">\
             <input type=\"hidden\" name=\"return_to\" value=\"{}\">\
             <label>Limit <input type=\"number\" name=\"limit\" min=\"1\" placeholder=\"all\"></label> \
             <button type=\"submit\">🤖 Enrich pending reviews</button></form>",
            html_escape(&query.token_suffix()),
            html_escape(&qs)
        );
    }
    html
}

fn render_review(review: &Review, query: &ViewQuery, qs: &str, ctx: &DashboardContext) -> String {
    let mut html = String::new();
    let _ = writeln!(
        html,
        "<div class=\"review\" style=\"border-left-color: {}\">",
        review.rating.sentiment().color()
    );
    let _ = writeln!(
        html,
        "<div><strong>{} {} {}</strong> <span class=\"muted\">#{} · {}</span></div>",
        review.rating.emoji(),
        stars(review.rating),
        review.rating.label(),
        review.id,
        review.timestamp.format(triage_common::time::TIMESTAMP_FORMAT)
    );
    let _ = writeln!(html, "<pre>{}</pre>", html_escape(&review.review));

    if review.is_pending() {
        html.push_str("<div class=\"muted\">⏳ Pending enrichment</div>\n");
        if ctx.ai_enabled {
            let _ = writeln!(
                html,
                "<form class=\"inline\" method=\"post\" action=\"/reviews/{}/enrich{}\">\
                 <input type=\"hidden\" name=\"return_to\" value=\"{}\">\
                 <button type=\"submit\">Enrich</button></form>",
                review.id,
                html_escape(&query.token_suffix()),
                html_escape(qs)
            );
        }
    } else {
        for (label, text) in [
            ("Summary", &review.ai_summary),
            ("Response", &review.ai_response),
            ("Recommended actions", &review.recommended_actions),
        ] {
            let _ = writeln!(html, "<div><strong>{}</strong><pre>{}</pre></div>", label, html_escape(text));
        }
    }
    html.push_str("</div>\n");
    html
}

fn render_pagination(query: &ViewQuery, view: &ReviewView) -> String {
    let p = view.pagination();
    if p.total_pages <= 1 {
        return String::new();
    }
    let mut html = String::from("<p>");
    if p.has_previous() {
        let _ = write!(html, "<a href=\"/?{}\">← Previous</a> ", html_escape(&query.query_string(p.page - 1)));
    }
    let _ = write!(html, "Page {} of {}", p.page, p.total_pages);
    if p.has_next() {
        let _ = write!(html, " <a href=\"/?{}\">Next →</a>", html_escape(&query.query_string(p.page + 1)));
    }
    html.push_str("</p>\n");
    html
}

/// The full dashboard for one view
pub fn render_dashboard(query: &ViewQuery, view: &ReviewView, ctx: &DashboardContext) -> String {
    let mut body = String::new();
    body.push_str("<h1>📊 Review Dashboard</h1>\n");
    body.push_str(&render_filters(query));
    body.push_str(&render_metrics(view));
    body.push_str("<h2>Reviews</h2>\n");
    body.push_str(&render_actions(query, view, ctx));

    if view.records.is_empty() {
        body.push_str("<p class=\"muted\">No reviews match the current filters.</p>\n");
    } else {
        let range = view.pagination().range(view.total_matching);
        let _ = writeln!(
            body,
            "<p class=\"muted\">Showing {}–{} of {}</p>",
            range.start + 1,
            range.end,
            view.total_matching
        );
        let qs = query.query_string(view.page);
        for review in &view.records {
            body.push_str(&render_review(review, query, &qs, ctx));
        }
    }
    body.push_str(&render_pagination(query, view));

    page("Review Dashboard", &body)
}

/// GET / on the admin surface
pub async fn dashboard_page(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let query = match ViewQuery::from_pairs(&pairs) {
        Ok(query) => query,
        Err(e) => {
            let body = render_message("Invalid filters", e.message(), "/");
            return (StatusCode::BAD_REQUEST, Html(body)).into_response();
        }
    };

    let view = match load_view(&state, &query).await {
        Ok(view) => view,
        Err(e) => {
            let body = render_message("Reviews unavailable", e.message(), "/");
            return (e.status(), Html(body)).into_response();
        }
    };

    let ctx = DashboardContext {
        ai_enabled: state.enricher.is_some(),
        batch_running: state.batch_running().await,
    };
    Html(render_dashboard(&query, &view, &ctx)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape("<script>alert('x') & \"y\"</script>"),
            "&lt;script&gt;alert(&#39;x&#39;) &amp; &quot;y&quot;&lt;/script&gt;"
        );
    }

    #[test]
    fn test_form_keeps_input_and_escapes() {
        let html = render_submission_form(Some("Too short"), Some(2), "<b>bad</b>");
        assert!(html.contains("<p class=\"error\">Too short</p>"));
        assert!(html.contains("&lt;b&gt;bad&lt;/b&gt;</textarea>"));
        assert!(html.contains("value=\"2\" checked"));
        assert!(!html.contains("value=\"5\" checked"));
    }
}
