use anyhow::Context;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use uuid::Uuid;

use crate::{
    config::Config,
    models::{booking::Booking, tenant::shop_offset},
};

/// What a booking email needs to know about the shop and the appointment.
pub struct BookingEmail {
    pub shop_name: String,
    pub timezone_offset_minutes: i32,
    pub booking: Booking,
}

impl BookingEmail {
    /// Start time in the shop's local time, e.g. `Wed 15 May 2030, 09:30`.
    pub fn local_start(&self) -> String {
        self.booking
            .start_at
            .with_timezone(&shop_offset(self.timezone_offset_minutes))
            .format("%a %d %b %Y, %H:%M")
            .to_string()
    }

    fn details_text(&self) -> String {
        let b = &self.booking;
        format!(
            "Service: {}\nBarber: {}\nWhen: {}\nConfirmation code: {}",
            b.service_name,
            b.barber_name,
            self.local_start(),
            b.confirmation_code
        )
    }

    fn details_html(&self) -> String {
        let b = &self.booking;
        let row = |label: &str, value: &str| {
            format!(
                r#"<tr><td style="padding:6px 12px 6px 0;font-size:14px;color:#64748b">{label}</td><td style="padding:6px 0;font-size:14px;color:#0f172a;font-weight:600">{value}</td></tr>"#
            )
        };
        format!(
            r#"<table role="presentation" cellpadding="0" cellspacing="0" style="margin:0 0 24px 0">{}{}{}{}</table>"#,
            row("Service", &b.service_name),
            row("Barber", &b.barber_name),
            row("When", &self.local_start()),
            row("Confirmation code", &b.confirmation_code),
        )
    }
}

pub struct EmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailService {
    /// Returns None if SMTP is not fully configured.
    pub fn new(config: &Config) -> Option<Self> {
        let host = config.smtp_host.as_deref()?;
        let username = config.smtp_username.clone()?;
        let password = config.smtp_password.clone()?;
        let from_addr = config.smtp_from.as_deref()?;

        let port = config.smtp_port.unwrap_or(587);
        let creds = Credentials::new(username, password);

        let transport = if port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .ok()?
                .credentials(creds)
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .ok()?
                .port(port)
                .credentials(creds)
                .build()
        };

        let from: Mailbox = from_addr.parse().ok()?;

        Some(Self { transport, from })
    }

    // ─── Private helpers ─────────────────────────────────────────────────────

    fn new_message_id(&self) -> String {
        format!("<{}@{}>", Uuid::new_v4(), self.from.email.domain())
    }

    fn recipient(to_email: &str, to_name: &str) -> anyhow::Result<Mailbox> {
        format!("{to_name} <{to_email}>")
            .parse()
            .or_else(|_| to_email.parse())
            .with_context(|| format!("Invalid recipient address: {to_email}"))
    }

    /// Wraps inner HTML content in the shared email layout.
    fn wrap_html(shop_name: &str, content: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width,initial-scale=1">
  <title>{shop_name}</title>
</head>
<body style="margin:0;padding:0;background-color:#f1f5f9;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,Helvetica,Arial,sans-serif">
  <table role="presentation" width="100%" cellpadding="0" cellspacing="0" style="background-color:#f1f5f9;padding:40px 16px">
    <tr>
      <td align="center">
        <table role="presentation" width="100%" cellpadding="0" cellspacing="0" style="max-width:520px">
          <tr>
            <td align="center" style="padding-bottom:28px">
              <p style="margin:0;font-size:20px;font-weight:700;color:#0f172a;text-align:center">{shop_name}</p>
            </td>
          </tr>
          <tr>
            <td style="background:#ffffff;border-radius:12px;padding:40px;box-shadow:0 1px 3px rgba(0,0,0,0.08)">
              {content}
            </td>
          </tr>
        </table>
      </td>
    </tr>
  </table>
</body>
</html>"#
        )
    }

    async fn send_email(
        &self,
        sender_name: &str,
        to: Mailbox,
        subject: &str,
        text: &str,
        html: &str,
    ) -> anyhow::Result<()> {
        let from = Mailbox::new(Some(sender_name.to_string()), self.from.email.clone());
        let email = Message::builder()
            .message_id(Some(self.new_message_id()))
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html.to_string()),
                    ),
            )
            .context("Failed to build email message")?;

        self.transport
            .send(email)
            .await
            .context("Failed to send email")?;

        Ok(())
    }

    async fn send_booking_email(
        &self,
        info: &BookingEmail,
        subject: String,
        heading: &str,
        intro: &str,
    ) -> anyhow::Result<()> {
        let Some(to_email) = info.booking.client_email.as_deref() else {
            return Ok(());
        };
        let to_name = &info.booking.client_name;
        let to = Self::recipient(to_email, to_name)?;

        let text = format!(
            "Hi {to_name},\n\n{intro}\n\n{}\n\n{}",
            info.details_text(),
            info.shop_name
        );
        let content = format!(
            r#"<h1 style="margin:0 0 8px 0;font-size:22px;font-weight:700;color:#0f172a">{heading}</h1>
<p style="margin:0 0 24px 0;font-size:15px;color:#64748b;line-height:1.6">Hi <strong style="color:#334155">{to_name}</strong>,<br><br>{intro}</p>
{}"#,
            info.details_html()
        );
        let html = Self::wrap_html(&info.shop_name, &content);
        self.send_email(&info.shop_name, to, &subject, &text, &html).await
    }

    // ─── Public methods ───────────────────────────────────────────────────────

    pub async fn send_welcome_email(
        &self,
        to_email: &str,
        to_name: &str,
        shop_name: &str,
        login_url: &str,
        trial_expires_at: &str,
    ) -> anyhow::Result<()> {
        let to = Self::recipient(to_email, to_name)?;
        let subject = format!("{shop_name} is ready to take bookings");

        let text = format!(
            "Hi {to_name},\n\n\
            Your barbershop \"{shop_name}\" is set up and available at:\n\
            {login_url}\n\n\
            Your free trial runs until {trial_expires_at}.\n\n\
            To get started: add your services, add your barbers and set their weekly hours.\n\
            Clients can book as soon as a barber has opening hours."
        );

        let content = format!(
            r#"<h1 style="margin:0 0 8px 0;font-size:22px;font-weight:800;color:#0f172a">Welcome aboard!</h1>
<p style="margin:0 0 20px 0;font-size:15px;color:#374151;line-height:1.6">Hi <strong>{to_name}</strong>, your barbershop <strong>{shop_name}</strong> is set up.</p>
<div style="text-align:center;margin:28px 0">
  <a href="{login_url}" style="display:inline-block;padding:13px 32px;background:#0f172a;color:#fff;font-weight:700;font-size:15px;border-radius:12px;text-decoration:none">Open my dashboard</a>
</div>
<p style="margin:0;font-size:14px;color:#64748b">Free trial active until <strong>{trial_expires_at}</strong>.</p>"#
        );

        let html = Self::wrap_html(shop_name, &content);
        self.send_email(shop_name, to, &subject, &text, &html).await
    }

    pub async fn send_booking_confirmation(&self, info: &BookingEmail) -> anyhow::Result<()> {
        self.send_booking_email(
            info,
            format!("Booking confirmed at {}", info.shop_name),
            "Your booking is confirmed",
            "Thanks for booking with us. Here are the details of your appointment.",
        )
        .await
    }

    pub async fn send_booking_cancellation(&self, info: &BookingEmail) -> anyhow::Result<()> {
        self.send_booking_email(
            info,
            format!("Booking cancelled at {}", info.shop_name),
            "Your booking was cancelled",
            "The following appointment has been cancelled. You are welcome to book another time.",
        )
        .await
    }

    pub async fn send_booking_reminder(&self, info: &BookingEmail) -> anyhow::Result<()> {
        self.send_booking_email(
            info,
            format!("Reminder: your appointment at {}", info.shop_name),
            "See you soon",
            "This is a reminder of your upcoming appointment.",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn booking() -> Booking {
        let start = Utc.with_ymd_and_hms(2030, 5, 15, 14, 30, 0).unwrap();
        Booking {
            id: Uuid::new_v4(),
            barber_id: Uuid::new_v4(),
            barber_name: "Marco".into(),
            service_id: Uuid::new_v4(),
            service_name: "Skin fade".into(),
            client_id: None,
            client_name: "Ana Ruiz".into(),
            client_phone: None,
            client_email: Some("ana@example.com".into()),
            start_at: start,
            end_at: start + chrono::Duration::minutes(30),
            status: "confirmed".into(),
            notes: None,
            confirmation_code: "K3X9QZ".into(),
            price_cents: 2500,
            reminder_sent_at: None,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn start_time_is_rendered_in_shop_time() {
        let info = BookingEmail {
            shop_name: "Fade Club".into(),
            timezone_offset_minutes: -300,
            booking: booking(),
        };
        assert_eq!(info.local_start(), "Wed 15 May 2030, 09:30");
    }

    #[test]
    fn details_carry_the_confirmation_code() {
        let info = BookingEmail {
            shop_name: "Fade Club".into(),
            timezone_offset_minutes: 0,
            booking: booking(),
        };
        let text = info.details_text();
        assert!(text.contains("Skin fade"));
        assert!(text.contains("Marco"));
        assert!(text.contains("K3X9QZ"));
        assert!(info.details_html().contains("K3X9QZ"));
    }

    #[test]
    fn recipient_falls_back_to_bare_address() {
        let mb = EmailService::recipient("ana@example.com", "Ana <weird>").unwrap();
        assert_eq!(mb.email.to_string(), "ana@example.com");
        assert!(EmailService::recipient("not-an-address", "Ana").is_err());
    }
}
