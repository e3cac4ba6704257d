//! Self-contained HTML rendering of a digest.

use chrono::{DateTime, Utc};

use digest_common::{Citation, Topic};

/// Render the full digest page. Every piece of upstream text is escaped.
pub fn render_digest_html(
    title: &str,
    summary: &str,
    topics: &[Topic],
    generated_at: DateTime<Utc>,
) -> String {
    let lead_html = if summary.trim().is_empty() {
        String::new()
    } else {
        format!(r#"<p class="lead">{}</p>"#, html_escape(summary))
    };

    let topics_html: String = topics
        .iter()
        .enumerate()
        .map(|(i, t)| render_topic(i + 1, t))
        .collect::<Vec<_>>()
        .join("\n");

    let content = format!(
        r#"<div class="container">
    <h1>{title}</h1>
    <p class="meta">Generated {generated}</p>
    {lead_html}
    {topics_html}
</div>"#,
        title = html_escape(title),
        generated = generated_at.format("%Y-%m-%d %H:%M UTC"),
    );

    build_page(title, &content)
}

fn render_topic(rank: usize, topic: &Topic) -> String {
    let section = |label: &str, text: &str| -> String {
        if text.trim().is_empty() {
            String::new()
        } else {
            format!(
                r#"<h4>{label}</h4><p>{}</p>"#,
                html_escape(text)
            )
        }
    };

    let citations: String = topic
        .citations
        .iter()
        .map(render_citation)
        .collect::<Vec<_>>()
        .join("");

    let posts_html = if topic.related_posts.is_empty() {
        String::new()
    } else {
        let items: String = topic
            .related_posts
            .iter()
            .map(|p| {
                let check = if p.author_verified { " &#10003;" } else { "" };
                format!(
                    r#"<li><a href="{url}" target="_blank" rel="noopener">@{handle}</a>{check}: {content}
                    <span class="stats">{likes} likes &middot; {shares} reposts &middot; {replies} replies &middot; impact {impact:.1}</span></li>"#,
                    url = html_escape(&p.url),
                    handle = html_escape(&p.author_handle),
                    content = html_escape(&p.content),
                    likes = p.like_count,
                    shares = p.share_count,
                    replies = p.reply_count,
                    impact = p.impact_score,
                )
            })
            .collect::<Vec<_>>()
            .join("");
        format!(r#"<h4>Posts</h4><ul class="posts">{items}</ul>"#)
    };

    let hashtags_html = if topic.related_hashtags.is_empty() {
        String::new()
    } else {
        let tags: String = topic
            .related_hashtags
            .iter()
            .map(|h| {
                format!(
                    r#"<span class="tag">{}</span>"#,
                    html_escape(&h.tag)
                )
            })
            .collect::<Vec<_>>()
            .join("");
        format!(r#"<div class="tags">{tags}</div>"#)
    };

    format!(
        r#"<div class="topic-card">
        <span class="badge badge-{source}">{source}</span>
        <h2>{rank}. {title}</h2>
        <p class="summary">{summary}</p>
        {viral}{value}{insights}
        <h4>Sources</h4>
        <ul class="citations">{citations}</ul>
        {posts_html}
        {hashtags_html}
        <p class="score">Score {score:.1}</p>
    </div>"#,
        source = topic.source.label(),
        title = html_escape(&topic.title),
        summary = html_escape(&topic.summary),
        viral = section("Why it's viral", &topic.viral_reason),
        value = section("Why it matters", &topic.value_reason),
        insights = section("Insights", &topic.insights),
        score = topic.overall_score,
    )
}

fn render_citation(citation: &Citation) -> String {
    format!(
        r#"<li class="{kind}"><a href="{url}" target="_blank" rel="noopener">{title}</a></li>"#,
        kind = citation.kind_label(),
        url = html_escape(citation.url()),
        title = html_escape(citation.title()),
    )
}

fn build_page(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
*{{margin:0;padding:0;box-sizing:border-box;}}
body{{font-family:-apple-system,BlinkMacSystemFont,"Segoe UI",Roboto,sans-serif;color:#1a1a1a;background:#fafafa;}}
.container{{max-width:820px;margin:0 auto;padding:24px;}}
h1{{font-size:26px;margin-bottom:4px;}}
.meta{{color:#888;font-size:13px;margin-bottom:16px;}}
.lead{{font-size:16px;line-height:1.5;margin-bottom:24px;}}
.topic-card{{background:#fff;border:1px solid #e0e0e0;border-radius:8px;padding:16px;margin-bottom:16px;}}
.topic-card h2{{font-size:18px;margin:6px 0;}}
.topic-card h4{{font-size:13px;text-transform:uppercase;color:#666;margin:12px 0 4px;}}
.topic-card p{{font-size:14px;line-height:1.5;}}
.topic-card ul{{margin-left:18px;font-size:14px;}}
.topic-card a{{color:#0066cc;text-decoration:none;}}
.badge{{display:inline-block;padding:2px 8px;border-radius:12px;font-size:11px;font-weight:600;text-transform:uppercase;}}
.badge-backendA{{background:#e3f2fd;color:#1565c0;}}
.badge-backendB{{background:#f3e5f5;color:#6a1b9a;}}
.stats{{display:block;color:#888;font-size:12px;}}
.tag{{display:inline-block;background:#eee;border-radius:4px;padding:1px 6px;margin:8px 6px 0 0;font-size:12px;}}
.score{{color:#888;font-size:12px;margin-top:12px;}}
</style>
</head>
<body>
{content}
</body>
</html>"#,
        title = html_escape(title),
    )
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use digest_common::{BackendId, Hashtag};
    use std::sync::Arc;

    fn topic(title: &str) -> Topic {
        Topic::new(
            title,
            "A summary",
            "Everyone shared it",
            "",
            "Watch the benchmarks",
            vec![Citation::from_link("Reuters story", "https://reuters.com/x?a=1&b=2")],
            BackendId::BackendA,
        )
    }

    #[test]
    fn escapes_markup_in_content() {
        assert_eq!(
            html_escape(r#"<b>"x" & 'y'</b>"#),
            "&lt;b&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/b&gt;"
        );
        let topics = [topic("<script>alert(1)</script>")];
        let html = render_digest_html("T", "", &topics, Utc::now());
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn renders_topics_in_list_order() {
        let html = render_digest_html("T", "lead", &[topic("First"), topic("Second")], Utc::now());
        let first = html.find("1. First").unwrap();
        let second = html.find("2. Second").unwrap();
        assert!(first < second);
    }

    #[test]
    fn embeds_citations_and_hashtags() {
        let mut t = topic("Model X");
        t.related_hashtags = vec![Arc::new(Hashtag::new("#ModelX", 3, 10, 1, 0))];
        let html = render_digest_html("T", "lead", &[t], Utc::now());
        assert!(html.contains(r#"href="https://reuters.com/x?a=1&amp;b=2""#));
        assert!(html.contains("Reuters story"));
        assert!(html.contains("#ModelX"));
    }

    #[test]
    fn empty_sections_are_omitted() {
        let html = render_digest_html("T", "", &[topic("Model X")], Utc::now());
        assert!(!html.contains("Why it matters"));
        assert!(html.contains("Why it's viral"));
        assert!(!html.contains(r#"class="lead""#));
    }
}
