//! Order emails.
//!
//! Uses SMTP via lettre for delivery with Askama HTML templates. A confirmed
//! order produces two messages: a receipt for the buyer and a notification
//! for the shop.

use askama::Template;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;
use crate::models::{Order, OrderLineDetail};
use crate::services::webhooks::OrderNotifier;
use crate::stripe::ShippingDetails;

/// HTML template for the buyer's receipt.
#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    order: &'a OrderEmailContext,
}

/// Plain text template for the buyer's receipt.
#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    order: &'a OrderEmailContext,
}

/// HTML template for the shop's new-order notification.
#[derive(Template)]
#[template(path = "email/merchant_notification.html")]
struct MerchantNotificationHtml<'a> {
    order: &'a OrderEmailContext,
}

/// Plain text template for the shop's new-order notification.
#[derive(Template)]
#[template(path = "email/merchant_notification.txt")]
struct MerchantNotificationText<'a> {
    order: &'a OrderEmailContext,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Everything the templates show, pre-rendered to strings.
struct OrderEmailContext {
    order_id: String,
    full_name: String,
    mail: String,
    phone: String,
    delivery_method: String,
    lines: Vec<OrderEmailLine>,
    subtotal: String,
    tax: String,
    total: String,
    /// Rendered one-line destination; `None` for pickup orders.
    ship_to: Option<String>,
}

struct OrderEmailLine {
    name: String,
    selector: String,
    count: i32,
    total: String,
}

impl OrderEmailContext {
    fn build(order: &Order, lines: &[OrderLineDetail]) -> Self {
        let lines = lines
            .iter()
            .map(|line| OrderEmailLine {
                name: line.name.clone(),
                selector: line.selector_value.clone(),
                count: line.count,
                total: money(line.price * rust_decimal::Decimal::from(line.count)),
            })
            .collect();

        Self {
            order_id: order.id.to_string(),
            full_name: order.full_name.clone(),
            mail: order.mail.as_str().to_owned(),
            phone: order.phone.clone(),
            delivery_method: order.delivery_type.as_str().to_owned(),
            lines,
            subtotal: money(order.sum),
            tax: money(order.tax),
            total: money(order.total),
            ship_to: ship_to(order),
        }
    }
}

fn money(amount: rust_decimal::Decimal) -> String {
    amount.round_dp(2).to_string()
}

/// One-line destination for a shipped order.
///
/// The address Stripe collected wins; before it lands (or if collection was
/// skipped) the form fields from checkout are used instead.
fn ship_to(order: &Order) -> Option<String> {
    if !order.delivery_type.requires_shipping() {
        return None;
    }

    if let Some(value) = &order.shipping_address
        && let Ok(details) = serde_json::from_value::<ShippingDetails>(value.clone())
    {
        let mut parts: Vec<String> = Vec::new();
        if let Some(name) = details.name {
            parts.push(name);
        }
        if let Some(address) = details.address {
            for piece in [
                address.line1,
                address.line2,
                address.city,
                address.state,
                address.postal_code,
                address.country,
            ] {
                if let Some(piece) = piece {
                    parts.push(piece);
                }
            }
        }
        if !parts.is_empty() {
            return Some(parts.join(", "));
        }
    }

    let parts: Vec<String> = [
        order.address_line_1.clone(),
        order.address_line_2.clone(),
        order.city.clone(),
        order.region.clone(),
        order.zip_code.clone(),
        order.country.clone(),
    ]
    .into_iter()
    .flatten()
    .collect();

    (!parts.is_empty()).then(|| parts.join(", "))
}

/// Email service for order mail.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    merchant_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be set up.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
            merchant_address: config.merchant_address.clone(),
        })
    }

    /// Send the buyer their receipt.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or a template fails to render.
    pub async fn send_order_confirmation(
        &self,
        order: &Order,
        lines: &[OrderLineDetail],
    ) -> Result<(), EmailError> {
        let context = OrderEmailContext::build(order, lines);
        let html = OrderConfirmationHtml { order: &context }.render()?;
        let text = OrderConfirmationText { order: &context }.render()?;

        self.send_multipart_email(
            order.mail.as_str(),
            &format!("Your order {} is confirmed", context.order_id),
            &text,
            &html,
        )
        .await
    }

    /// Tell the shop a paid order came in.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or a template fails to render.
    pub async fn send_merchant_notification(
        &self,
        order: &Order,
        lines: &[OrderLineDetail],
    ) -> Result<(), EmailError> {
        let context = OrderEmailContext::build(order, lines);
        let html = MerchantNotificationHtml { order: &context }.render()?;
        let text = MerchantNotificationText { order: &context }.render()?;

        self.send_multipart_email(
            &self.merchant_address,
            &format!("New paid order {}", context.order_id),
            &text,
            &html,
        )
        .await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

#[async_trait]
impl OrderNotifier for EmailService {
    async fn order_confirmed(
        &self,
        order: &Order,
        lines: &[OrderLineDetail],
    ) -> Result<(), EmailError> {
        self.send_order_confirmation(order, lines).await?;
        self.send_merchant_notification(order, lines).await
    }
}
