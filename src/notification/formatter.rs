use std::collections::HashMap;
use std::time::Duration;

use handlebars::Handlebars;
use serde::Serialize;

use crate::notification::payload::NotificationPayload;

/// 时长的统一人类可读渲染，所有渠道共用同一份输出
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1_000 {
        format!("{}ms", millis)
    } else if millis < 60_000 {
        format!("{:.1}s", duration.as_secs_f64())
    } else {
        let total_secs = duration.as_secs();
        format!("{}m {}s", total_secs / 60, total_secs % 60)
    }
}

/// 同一载荷在四种渠道表示下的渲染结果
///
/// 信息内容完全一致，只有标记和转义不同。
#[derive(Debug, Clone, Serialize)]
pub struct FormattedNotification {
    pub plain_text: String,
    pub html: String,
    pub slack: String,
    pub discord: String,
}

/// 消息格式化器
///
/// 纯函数层，不做任何 I/O。纯文本和 HTML 走模板引擎，
/// 聊天渠道的 markdown 方言在代码里手工拼装并按各自规则转义。
pub struct MessageFormatter {
    handlebars: Handlebars<'static>,
    templates: HashMap<String, String>,
}

impl MessageFormatter {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.register_helper("severity_color", Box::new(severity_color_helper));

        let mut formatter = Self {
            handlebars,
            templates: HashMap::new(),
        };
        formatter.load_default_templates();
        formatter
    }

    fn load_default_templates(&mut self) {
        // 纯文本模板：三重花括号跳过 HTML 转义
        let plain_template = r#"{{{emoji}}} {{{summary}}}

Source: {{{source_id}}}
Severity: {{{severity}}}
Time: {{{timestamp}}}
{{#each fields}}{{{label}}}: {{{value}}}
{{/each}}{{#if correlation_id}}Correlation: {{{correlation_id}}}
{{/if}}"#;

        // 邮件 HTML 模板，默认的双花括号负责 HTML 转义
        let html_template = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>{{summary}}</title>
    <style>
        body { font-family: Arial, sans-serif; line-height: 1.6; color: #333; }
        .header { background-color: {{severity_color severity}}; color: white; padding: 20px; border-radius: 5px 5px 0 0; }
        .content { padding: 20px; border: 1px solid #ddd; border-top: none; border-radius: 0 0 5px 5px; }
        .fields { background-color: #f9f9f9; padding: 15px; margin-top: 20px; border-radius: 5px; }
    </style>
</head>
<body>
    <div class="header">
        <h1>{{emoji}} {{summary}}</h1>
    </div>
    <div class="content">
        <p><strong>Source:</strong> {{source_id}}</p>
        <p><strong>Severity:</strong> {{severity}}</p>
        <p><strong>Time:</strong> {{timestamp}}</p>
{{#if fields}}
        <div class="fields">
            <ul>
{{#each fields}}
                <li><strong>{{label}}:</strong> {{value}}</li>
{{/each}}
            </ul>
        </div>
{{/if}}
{{#if correlation_id}}
        <p><small>Correlation: {{correlation_id}}</small></p>
{{/if}}
    </div>
</body>
</html>
"#;

        if let Err(e) = self.register_template("plain_default", plain_template) {
            log::error!("Failed to register plain text template: {}", e);
        }
        if let Err(e) = self.register_template("html_default", html_template) {
            log::error!("Failed to register html template: {}", e);
        }
    }

    /// 注册模板，同名覆盖
    pub fn register_template(&mut self, name: &str, template: &str) -> anyhow::Result<()> {
        self.handlebars.register_template_string(name, template)?;
        self.templates.insert(name.to_string(), template.to_string());
        Ok(())
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn list_templates(&self) -> Vec<String> {
        self.templates.keys().cloned().collect()
    }

    /// 渲染一条载荷到全部四种表示
    pub fn format(&self, payload: &NotificationPayload) -> anyhow::Result<FormattedNotification> {
        let context = self.create_context(payload);

        Ok(FormattedNotification {
            plain_text: self.handlebars.render("plain_default", &context)?,
            html: self.handlebars.render("html_default", &context)?,
            slack: render_slack(payload),
            discord: render_discord(payload),
        })
    }

    fn create_context(&self, payload: &NotificationPayload) -> serde_json::Value {
        serde_json::json!({
            "summary": payload.summary,
            "source_id": payload.source_id,
            "severity": payload.severity.label(),
            "emoji": payload.severity.emoji(),
            "timestamp": payload.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            "fields": payload.fields,
            "correlation_id": payload.correlation_id,
        })
    }
}

impl Default for MessageFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Slack mrkdwn 只要求转义三个保留字符
fn escape_slack(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Discord markdown 用反斜杠转义格式字符
fn escape_discord(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '*' | '_' | '~' | '`' | '|') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn render_slack(payload: &NotificationPayload) -> String {
    let mut text = format!(
        "{} *{}*\n*Source:* {}\n*Severity:* {}\n*Time:* {}\n",
        payload.severity.emoji(),
        escape_slack(&payload.summary),
        escape_slack(&payload.source_id),
        payload.severity.label(),
        payload.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
    );

    for field in &payload.fields {
        text.push_str(&format!(
            "*{}:* {}\n",
            escape_slack(&field.label),
            escape_slack(&field.value)
        ));
    }

    if let Some(ref correlation_id) = payload.correlation_id {
        text.push_str(&format!("Correlation: {}\n", escape_slack(correlation_id)));
    }

    text
}

fn render_discord(payload: &NotificationPayload) -> String {
    let mut text = format!(
        "{} **{}**\n**Source:** {}\n**Severity:** {}\n**Time:** {}\n",
        payload.severity.emoji(),
        escape_discord(&payload.summary),
        escape_discord(&payload.source_id),
        payload.severity.label(),
        payload.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
    );

    for field in &payload.fields {
        text.push_str(&format!(
            "**{}:** {}\n",
            escape_discord(&field.label),
            escape_discord(&field.value)
        ));
    }

    if let Some(ref correlation_id) = payload.correlation_id {
        text.push_str(&format!(
            "Correlation: {}\n",
            escape_discord(correlation_id)
        ));
    }

    text
}

/// 严重程度颜色辅助函数
fn severity_color_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let severity = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("Info");

    let color = match severity {
        "Critical" => "#D32F2F",
        "Error" => "#FF5722",
        "Warning" => "#FFC107",
        _ => "#2196F3",
    };

    out.write(color)?;
    Ok(())
}
