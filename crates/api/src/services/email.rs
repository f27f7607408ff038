//! Email service for order confirmations.
//!
//! Uses SMTP via lettre for delivery with Askama HTML and plain text templates.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::instrument;

use emporium_core::Price;

use crate::config::EmailConfig;
use crate::models::Order;

/// One rendered order line.
struct EmailLine {
    name: String,
    quantity: i32,
    line_total: String,
}

/// Values shared by both confirmation templates.
struct ConfirmationView {
    order_id: String,
    customer_name: String,
    lines: Vec<EmailLine>,
    subtotal: String,
    shipping: String,
    total: String,
    address: Vec<String>,
}

impl ConfirmationView {
    fn from_order(order: &Order) -> Self {
        let money = |amount| Price::new(amount, order.currency).to_string();
        let c = &order.customer;

        let mut address = vec![c.address_line1.clone()];
        address.extend(c.address_line2.clone().filter(|l| !l.trim().is_empty()));
        address.push(format!("{}, {} {}", c.city, c.state, c.postal_code));

        Self {
            order_id: order.id.to_string(),
            customer_name: c.name.clone(),
            lines: order
                .items
                .iter()
                .map(|item| EmailLine {
                    name: item.product_name.clone(),
                    quantity: item.quantity,
                    line_total: money(item.line_total()),
                })
                .collect(),
            subtotal: money(order.subtotal),
            shipping: money(order.shipping),
            total: money(order.total),
            address,
        }
    }
}

/// HTML template for the order confirmation email.
#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    view: &'a ConfirmationView,
}

/// Plain text template for the order confirmation email.
#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    view: &'a ConfirmationView,
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

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay address is invalid.
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
        })
    }

    /// Send the confirmation for a captured order to its customer.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn send_order_confirmation(&self, order: &Order) -> Result<(), EmailError> {
        let (subject, text, html) = render_order_confirmation(order)?;

        self.send_multipart_email(order.customer.email.as_str(), &subject, &text, &html)
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

/// Render subject, plain text and HTML bodies.
fn render_order_confirmation(order: &Order) -> Result<(String, String, String), EmailError> {
    let view = ConfirmationView::from_order(order);
    let html = OrderConfirmationHtml { view: &view }.render()?;
    let text = OrderConfirmationText { view: &view }.render()?;
    let subject = format!("Order confirmed: {}", order.id);
    Ok((subject, text, html))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use emporium_core::{
        CurrencyCode, CustomerInfo, Email, OrderId, OrderStatus, PaymentId, ProductId, UserId,
    };

    use super::*;
    use crate::models::OrderItem;

    fn order() -> Order {
        Order {
            id: OrderId::new("order_Q1"),
            user_id: UserId::new(1),
            customer: CustomerInfo {
                name: "Asha <Patil>".to_owned(),
                email: Email::parse("asha@example.in").unwrap(),
                phone: "9820000000".to_owned(),
                address_line1: "12 Lake Road".to_owned(),
                address_line2: Some("  ".to_owned()),
                city: "Pune".to_owned(),
                state: "MH".to_owned(),
                postal_code: "411001".to_owned(),
            },
            currency: CurrencyCode::INR,
            subtotal: Decimal::from(1000),
            shipping: Decimal::from(80),
            total: Decimal::from(1080),
            amount_minor: 108_000,
            status: OrderStatus::Captured,
            payment_id: Some(PaymentId::new("pay_Q1")),
            items: vec![OrderItem {
                line_number: 0,
                product_id: ProductId::new(3),
                variant_index: None,
                product_name: "Cotton Tee".to_owned(),
                quantity: 2,
                unit_price: Decimal::from(500),
            }],
            created_at: Utc::now(),
            captured_at: Some(Utc::now()),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_render_order_confirmation() {
        let (subject, text, html) = render_order_confirmation(&order()).unwrap();

        assert_eq!(subject, "Order confirmed: order_Q1");
        for body in [&text, &html] {
            assert!(body.contains("order_Q1"));
            assert!(body.contains("Cotton Tee"));
            assert!(body.contains("₹1000.00"));
            assert!(body.contains("₹80.00"));
            assert!(body.contains("₹1080.00"));
            assert!(body.contains("Pune, MH 411001"));
        }
    }

    #[test]
    fn test_html_escapes_customer_input() {
        let (_, _, html) = render_order_confirmation(&order()).unwrap();
        assert!(!html.contains("<Patil>"));
        assert!(html.contains("Asha &#60;Patil&#62;"));
    }

    #[test]
    fn test_blank_second_address_line_is_skipped() {
        let view = ConfirmationView::from_order(&order());
        assert_eq!(view.address.len(), 2);
    }
}
