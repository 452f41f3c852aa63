use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::{authentication::Credentials, PoolConfig},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::{Deserialize, Serialize};

use crate::notification::formatter::FormattedNotification;
use crate::notification::payload::NotificationPayload;
use crate::notification::providers::ChannelAdapter;
use crate::notification::Channel;

/// 邮件配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// SMTP 服务器地址
    pub smtp_server: String,
    /// SMTP 端口
    pub smtp_port: u16,
    /// 用户名
    pub username: String,
    /// 密码
    pub password: String,
    /// 发件人地址
    pub from_address: String,
    /// 发件人名称
    pub from_name: Option<String>,
    /// 收件人地址列表
    pub to_addresses: Vec<String>,
    /// 连接池最大连接数
    pub pool_max_size: u32,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_server: String::new(),
            smtp_port: 587,
            username: String::new(),
            password: String::new(),
            from_address: String::new(),
            from_name: None,
            to_addresses: Vec::new(),
            pool_max_size: 10,
        }
    }
}

/// 邮件适配器
///
/// 地址和传输配置在构造时解析校验完毕，
/// 发送阶段只剩下真正的投递失败。
pub struct EmailAdapter {
    from: Mailbox,
    recipients: Vec<Mailbox>,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailAdapter {
    pub fn new(config: EmailConfig) -> anyhow::Result<Self> {
        if config.smtp_server.is_empty() {
            anyhow::bail!("Email SMTP server is empty");
        }
        if config.to_addresses.is_empty() {
            anyhow::bail!("Email config has no recipients");
        }

        let from: Mailbox = if let Some(ref name) = config.from_name {
            format!("{} <{}>", name, config.from_address)
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid email from address: {}", e))?
        } else {
            config
                .from_address
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid email from address: {}", e))?
        };

        let mut recipients = Vec::with_capacity(config.to_addresses.len());
        for address in &config.to_addresses {
            let mailbox: Mailbox = address
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid email recipient '{}': {}", address, e))?;
            recipients.push(mailbox);
        }

        let transport = Self::create_transport(&config)?;

        Ok(Self {
            from,
            recipients,
            transport,
        })
    }

    fn create_transport(
        config: &EmailConfig,
    ) -> anyhow::Result<AsyncSmtpTransport<Tokio1Executor>> {
        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_server)?.port(config.smtp_port);

        if !config.username.is_empty() && !config.password.is_empty() {
            let credentials = Credentials::new(config.username.clone(), config.password.clone());
            builder = builder.credentials(credentials);
        }

        builder = builder.pool_config(PoolConfig::new().max_size(config.pool_max_size));

        Ok(builder.build())
    }

    fn build_email(
        &self,
        payload: &NotificationPayload,
        rendered: &FormattedNotification,
    ) -> anyhow::Result<Message> {
        let subject = format!("[{}] {}", payload.severity.label(), payload.summary);

        let mut builder = Message::builder().from(self.from.clone()).subject(subject);

        for recipient in &self.recipients {
            builder = builder.to(recipient.clone());
        }

        let message = builder
            .header(ContentType::TEXT_HTML)
            .body(rendered.html.clone())?;

        Ok(message)
    }

    /// 测试 SMTP 连接
    pub async fn test_connection(&self) -> anyhow::Result<()> {
        self.transport.test_connection().await?;
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for EmailAdapter {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(
        &self,
        payload: &NotificationPayload,
        rendered: &FormattedNotification,
    ) -> anyhow::Result<()> {
        let message = self.build_email(payload, rendered)?;

        match self.transport.send(message).await {
            Ok(response) => {
                log::info!("Email notification delivered: {:?}", response);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to send email notification: {}", e);
                Err(anyhow::anyhow!("Failed to send email: {}", e))
            }
        }
    }
}
