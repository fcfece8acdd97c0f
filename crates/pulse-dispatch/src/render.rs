//! HTML email bodies for the two daily messages.
//!
//! Everything interpolated into markup goes through `escape`: problem text
//! and generated code come straight from a model.

use pulse_core::traits::mailer::OutgoingEmail;
use pulse_core::types::{Item, Solution, Subscriber};

/// Escape text for inclusion in HTML element content or a quoted attribute.
pub fn escape(text: &str) -> String {
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

/// Escaped text with line breaks kept.
fn paragraph(text: &str) -> String {
    escape(text).replace('\n', "<br>")
}

/// Morning challenge email.
pub fn challenge_email(
    app_name: &str,
    dashboard_url: &str,
    subscriber: &Subscriber,
    item: &Item,
) -> OutgoingEmail {
    let examples = item
        .examples
        .as_deref()
        .map(|ex| {
            format!(
                r#"<div style="background: #f8fafc; border: 1px solid #e2e8f0; border-radius: 8px; padding: 20px; margin-bottom: 20px;">
                    <h3 style="margin: 0 0 10px 0; font-size: 14px; color: #64748b;">EXAMPLES</h3>
                    <pre style="margin: 0; font-size: 13px; white-space: pre-wrap;">{}</pre>
                </div>"#,
                escape(ex)
            )
        })
        .unwrap_or_default();

    let html_body = format!(
        r#"<div style="font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; background-color: #f8fafc; padding: 40px 10px;">
    <div style="max-width: 600px; margin: auto; background: white; border-radius: 16px; overflow: hidden; border: 1px solid #e2e8f0;">
        <div style="background: #0f172a; padding: 30px; text-align: center;">
            <h1 style="color: #38bdf8; margin: 0; font-size: 24px; letter-spacing: 1px;">{app} MORNING</h1>
            <p style="color: #94a3b8; margin-top: 5px;">Level Up Your DSA Daily</p>
        </div>
        <div style="padding: 40px;">
            <div style="display: inline-block; background: #f1f5f9; color: #475569; padding: 4px 12px; border-radius: 20px; font-size: 12px; font-weight: 700; margin-bottom: 20px;">
                {difficulty} • {topic}
            </div>
            <h2 style="color: #1e293b; margin: 0 0 15px 0; font-size: 22px;">{title}</h2>
            <div style="color: #475569; line-height: 1.7; font-size: 15px; margin-bottom: 25px;">{statement}</div>
            <div style="background: #f8fafc; border: 1px solid #e2e8f0; border-radius: 8px; padding: 20px; margin-bottom: 20px;">
                <h3 style="margin: 0 0 10px 0; font-size: 14px; color: #64748b;">CONSTRAINTS</h3>
                <code style="color: #e11d48; font-size: 13px;">{constraints}</code>
            </div>
            {examples}
            <a href="{link}" style="display: block; text-align: center; background: #2563eb; color: white; padding: 15px; border-radius: 10px; text-decoration: none; font-weight: bold; font-size: 16px;">Solve Problem</a>
        </div>
        <div style="padding: 15px; text-align: center; font-size: 12px; color: #94a3b8; border-top: 1px solid #e2e8f0;">
            Track your streak at <a href="{dashboard}" style="color: #2563eb;">{dashboard}</a>
        </div>
    </div>
</div>"#,
        app = escape(&app_name.to_uppercase()),
        difficulty = escape(&item.difficulty.as_str().to_uppercase()),
        topic = escape(&item.topic),
        title = escape(&item.title),
        statement = paragraph(&item.statement),
        constraints = paragraph(&item.constraints),
        link = escape(&item.link),
        dashboard = escape(dashboard_url),
    );

    OutgoingEmail {
        to: subscriber.email.clone(),
        subject: format!("☀️ Morning Challenge: {}", item.title),
        html_body,
    }
}

/// Evening solution email.
pub fn solution_email(subscriber: &Subscriber, item: &Item, solution: &Solution) -> OutgoingEmail {
    let html_body = format!(
        r#"<div style="font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; background-color: #f0fdf4; padding: 40px 10px;">
    <div style="max-width: 600px; margin: auto; background: white; border-radius: 16px; overflow: hidden; border: 1px solid #dcfce7;">
        <div style="background: #166534; padding: 30px; text-align: center;">
            <h1 style="color: #86efac; margin: 0; font-size: 24px;">SOLUTION ANALYSIS</h1>
            <p style="color: #bbf7d0; margin-top: 5px;">Day {streak} Complete</p>
        </div>
        <div style="padding: 40px;">
            <h2 style="color: #14532d; margin-top: 0;">{title}</h2>
            <h3 style="color: #14532d;">Optimal Approach ({language})</h3>
            <p style="color: #374151; line-height: 1.6;">{approach}</p>
            <div style="background: #1e293b; color: #e2e8f0; padding: 20px; border-radius: 8px; font-family: monospace; font-size: 13px; margin: 20px 0; overflow-x: auto;">
                <pre style="margin: 0;">{code}</pre>
            </div>
            <table style="width: 100%; border-spacing: 10px 0;">
                <tr>
                    <td style="background: #f0fdf4; padding: 15px; border-radius: 8px; border: 1px solid #bbf7d0;">
                        <div style="font-size: 11px; color: #166534; font-weight: bold;">TIME</div>
                        <div style="font-weight: bold; color: #14532d;">{time}</div>
                    </td>
                    <td style="background: #f0fdf4; padding: 15px; border-radius: 8px; border: 1px solid #bbf7d0;">
                        <div style="font-size: 11px; color: #166534; font-weight: bold;">SPACE</div>
                        <div style="font-weight: bold; color: #14532d;">{space}</div>
                    </td>
                </tr>
            </table>
        </div>
    </div>
</div>"#,
        streak = subscriber.streak,
        title = escape(&item.title),
        language = escape(&subscriber.language),
        approach = paragraph(&solution.approach),
        code = escape(&solution.code),
        time = escape(&solution.time_complexity),
        space = escape(&solution.space_complexity),
    );

    OutgoingEmail {
        to: subscriber.email.clone(),
        subject: format!("✅ Solution: {}", item.title),
        html_body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pulse_core::types::{Difficulty, SubscriberStatus};

    fn subscriber() -> Subscriber {
        Subscriber {
            id: "s1".into(),
            email: "dev@example.com".into(),
            topic: "Arrays".into(),
            difficulty: Difficulty::Easy,
            language: "Rust".into(),
            streak: 7,
            status: SubscriberStatus::Active,
            last_item_id: Some("i1".into()),
            last_sent_at: None,
            created_at: Utc::now(),
        }
    }

    fn item() -> Item {
        Item {
            id: "i1".into(),
            topic: "Arrays".into(),
            difficulty: Difficulty::Easy,
            title: "Two Sum".into(),
            statement: "Return indices where a[i] + a[j] == target && i < j.".into(),
            constraints: "2 <= n <= 10^4".into(),
            link: "https://leetcode.com/problems/two-sum".into(),
            examples: Some("nums = [2,7], target = 9 -> [0,1]".into()),
            used: true,
            created_at: Utc::now(),
            used_at: Some(Utc::now()),
        }
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("<b>\"a\" & 'b'</b>"), "&lt;b&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/b&gt;");
    }

    #[test]
    fn test_challenge_email() {
        let email = challenge_email("AlgoPulse", "https://algopulse.dev", &subscriber(), &item());
        assert_eq!(email.to, "dev@example.com");
        assert_eq!(email.subject, "☀️ Morning Challenge: Two Sum");
        assert!(email.html_body.contains("ALGOPULSE MORNING"));
        assert!(email.html_body.contains("EASY • Arrays"));
        assert!(email.html_body.contains("&amp;&amp; i &lt; j"));
        assert!(email.html_body.contains(r#"<a href="https://leetcode.com/problems/two-sum""#));
        assert!(email.html_body.contains("Track your streak at"));
        assert!(email.html_body.contains("EXAMPLES"));
    }

    #[test]
    fn test_solution_email() {
        let solution = Solution {
            approach: "One pass with a map.".into(),
            code: "fn two_sum(v: Vec<i32>) -> Vec<usize> { todo!() }".into(),
            time_complexity: "O(n)".into(),
            space_complexity: "O(n)".into(),
        };
        let email = solution_email(&subscriber(), &item(), &solution);
        assert_eq!(email.subject, "✅ Solution: Two Sum");
        assert!(email.html_body.contains("Day 7 Complete"));
        assert!(email.html_body.contains("Vec&lt;i32&gt;"));
        assert!(email.html_body.contains("Optimal Approach (Rust)"));
    }
}
