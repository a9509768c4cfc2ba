use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use sqlx::SqlitePool;

use crate::{config::SmtpConfig, models::ContactFormRow};

const PRACTICE_NAME: &str = "Advanced Dermatology & Skin Cancer Specialists";

/// Best-effort transactional email. Every send returns a bool and logs its
/// own failures; nothing here ever propagates an error to the booking path.
#[derive(Clone)]
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Option<Mailbox>,
    fallback_location_email: String,
    copy_to: Option<String>,
}

impl Mailer {
    pub fn from_config(smtp: &SmtpConfig) -> Self {
        let fallback_location_email = smtp.fallback_location_email.clone();
        let copy_to = smtp.copy_to.clone();

        if !smtp.enabled() {
            log::warn!("EMAIL_USER/EMAIL_PASSWORD not set. Outbound email is disabled.");
            return Self {
                transport: None,
                from: None,
                fallback_location_email,
                copy_to,
            };
        }

        let from = match smtp.from.parse::<Mailbox>() {
            Ok(mailbox) => mailbox,
            Err(err) => {
                log::error!("Invalid EMAIL_FROM '{}': {err}. Outbound email is disabled.", smtp.from);
                return Self {
                    transport: None,
                    from: None,
                    fallback_location_email,
                    copy_to,
                };
            }
        };

        let transport = match AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host) {
            Ok(builder) => Some(
                builder
                    .credentials(Credentials::new(
                        smtp.username.clone(),
                        smtp.password.clone(),
                    ))
                    .port(587)
                    .build(),
            ),
            Err(err) => {
                log::error!("SMTP transport setup failed for {}: {err}. Outbound email is disabled.", smtp.host);
                None
            }
        };

        Self {
            transport,
            from: Some(from),
            fallback_location_email,
            copy_to,
        }
    }

    pub fn enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// Confirmation to the person who requested the appointment.
    pub async fn notify_booker(&self, form: &ContactFormRow) -> bool {
        let sent = self
            .send(
                std::slice::from_ref(&form.email),
                &format!("Thanks for creating an appointment! | {PRACTICE_NAME}"),
                thank_you_template(),
            )
            .await;
        if sent {
            log::info!("Thank you email sent to {}", form.email);
        }
        sent
    }

    /// Heads-up to the practice location the slot was booked at. The
    /// recipient comes from the location record, falling back to the
    /// configured default when the location has no email.
    pub async fn notify_location(&self, pool: &SqlitePool, form: &ContactFormRow) -> bool {
        let location: Option<(String, Option<String>)> =
            match sqlx::query_as("SELECT name, email FROM locations WHERE id = ?")
                .bind(&form.location_id)
                .fetch_optional(pool)
                .await
            {
                Ok(row) => row,
                Err(err) => {
                    log::warn!("Location lookup failed for {}: {err}", form.location_id);
                    None
                }
            };

        let (location_name, location_email) = location.unwrap_or((String::from("Unknown"), None));
        let recipient = location_email
            .filter(|email| !email.trim().is_empty())
            .unwrap_or_else(|| self.fallback_location_email.clone());

        let mut recipients = vec![recipient.clone()];
        if let Some(copy) = &self.copy_to {
            recipients.push(copy.clone());
        }

        let sent = self
            .send(
                &recipients,
                &format!(
                    "New Appointment Request: {} {}",
                    form.first_name, form.last_name
                ),
                location_template(form, &location_name),
            )
            .await;
        if sent {
            log::info!("Location notification email sent to {recipient}");
        }
        sent
    }

    async fn send(&self, recipients: &[String], subject: &str, html: String) -> bool {
        let (Some(transport), Some(from)) = (&self.transport, &self.from) else {
            return false;
        };

        let mut builder = Message::builder()
            .from(from.clone())
            .subject(subject)
            .header(ContentType::TEXT_HTML);
        for recipient in recipients {
            match recipient.parse::<Mailbox>() {
                Ok(mailbox) => builder = builder.to(mailbox),
                Err(err) => {
                    log::warn!("Skipping invalid recipient '{recipient}': {err}");
                }
            }
        }

        let message = match builder.body(html) {
            Ok(message) => message,
            Err(err) => {
                log::warn!("Email build failed: {err}");
                return false;
            }
        };

        match transport.send(message).await {
            Ok(_) => true,
            Err(err) => {
                log::warn!("Email send failed: {err}");
                false
            }
        }
    }
}

fn thank_you_template() -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <div style="text-align: center; padding: 20px 0;">
    <h1>{PRACTICE_NAME}</h1>
  </div>
  <div style="padding: 20px; background-color: #f9f9f9;">
    <h2>Thanks so much for requesting an appointment with {PRACTICE_NAME}.</h2>
    <p>By choosing a date and time you are requesting an appointment. Someone will contact you to confirm the appointment.</p>
    <p><strong>Please do not show up at our offices until you have a confirmed scheduled appointment.</strong></p>
    <p>Thank you!</p>
  </div>
</div>"#
    )
}

fn location_template(form: &ContactFormRow, location_name: &str) -> String {
    let description = if form.description.trim().is_empty() {
        "No description provided"
    } else {
        form.description.as_str()
    };
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2>New Appointment Request</h2>
  <p>A new appointment has been requested at {location_name} with the following details:</p>
  <ul>
    <li><strong>Name:</strong> {first} {last}</li>
    <li><strong>Email:</strong> {email}</li>
    <li><strong>Phone:</strong> {phone}</li>
    <li><strong>Date of Birth:</strong> {dob}</li>
    <li><strong>Insurance:</strong> {insurance}</li>
    <li><strong>Date:</strong> {date}</li>
    <li><strong>Time:</strong> {time}</li>
    <li><strong>Description:</strong> {description}</li>
  </ul>
  <p>Please contact the client to confirm this appointment.</p>
</div>"#,
        first = form.first_name,
        last = form.last_name,
        email = form.email,
        phone = form.phone_number,
        dob = form.patient_date_of_birth,
        insurance = form.insurance_info,
        date = form.date.as_deref().unwrap_or("-"),
        time = form.time_slot.as_deref().unwrap_or("-"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{new_id, now_rfc3339};

    fn sample_form() -> ContactFormRow {
        ContactFormRow {
            id: new_id(),
            first_name: "Jamie".into(),
            last_name: "Rivera".into(),
            email: "jamie@example.com".into(),
            phone_number: "555-0100".into(),
            store_info: false,
            patient_date_of_birth: "1990-01-15".into(),
            insurance_info: "Acme Health".into(),
            description: String::new(),
            location_id: "loc1".into(),
            date: Some("2025-03-10".into()),
            time_slot: Some("09:00".into()),
            created_at: now_rfc3339(),
        }
    }

    #[test]
    fn location_template_embeds_submission_fields() {
        let html = location_template(&sample_form(), "Downtown Clinic");
        assert!(html.contains("Jamie Rivera"));
        assert!(html.contains("Downtown Clinic"));
        assert!(html.contains("2025-03-10"));
        assert!(html.contains("09:00"));
        assert!(html.contains("No description provided"));
    }

    #[test]
    fn disabled_mailer_sends_nothing() {
        let mailer = Mailer::from_config(&SmtpConfig {
            host: "smtp.example.com".into(),
            username: String::new(),
            password: String::new(),
            from: "x <x@example.com>".into(),
            fallback_location_email: "fallback@example.com".into(),
            copy_to: None,
        });
        assert!(!mailer.enabled());
    }
}
