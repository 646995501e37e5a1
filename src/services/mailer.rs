use askama::Template;
use chrono::{DateTime, Utc};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info};

use crate::{
    config::AppConfig,
    error::AppError,
    models::{participant::Participant, trip::Trip},
};

#[derive(Template)]
#[template(path = "emails/trip_created.html")]
struct TripCreatedEmail<'a> {
    owner_name: &'a str,
    destination: &'a str,
    starts_at: String,
    ends_at: String,
    details_link: String,
}

#[derive(Template)]
#[template(path = "emails/invitation.html")]
struct InvitationEmail<'a> {
    destination: &'a str,
    starts_at: String,
    ends_at: String,
    confirm_link: String,
    manual_confirm_link: String,
    details_link: String,
}

#[derive(Template)]
#[template(path = "emails/invite_confirmation.html")]
struct InviteConfirmationEmail<'a> {
    destination: &'a str,
    starts_at: String,
    ends_at: String,
    confirm_link: String,
}

/// Sends templated HTML mail over SMTP. Also the single place confirmation
/// and details links are built, from the base URLs handed over at startup.
#[derive(Clone)]
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    sender: Mailbox,
    api_base_url: String,
    web_base_url: String,
}

impl Mailer {
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let sender: Mailbox = config.mail.sender.parse()?;
        let credentials = Credentials::new(
            config.mail.smtp_username.clone(),
            config.mail.smtp_password.clone(),
        );
        let transport =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.mail.smtp_host)?
                .port(config.mail.smtp_port)
                .credentials(credentials)
                .build();

        Ok(Self {
            transport: Some(transport),
            sender,
            api_base_url: config.api_base_url.clone(),
            web_base_url: config.web_base_url.clone(),
        })
    }

    /// Mailer without a transport: messages are rendered, then dropped with a
    /// debug log. Backs the test harness.
    pub fn noop(config: &AppConfig) -> Self {
        Self {
            transport: None,
            sender: "Trip Planner <team@planner.dev>"
                .parse()
                .expect("static sender address is valid"),
            api_base_url: config.api_base_url.clone(),
            web_base_url: config.web_base_url.clone(),
        }
    }

    /// Trip confirmation for the owner; carries the details link only, the
    /// owner has nothing to confirm.
    pub async fn send_trip_created(&self, trip: &Trip, owner: &Participant) -> Result<(), AppError> {
        let subject = format!(
            "Your trip to {} on {} is booked!",
            trip.destination,
            long_date(trip.starts_at)
        );
        let html = TripCreatedEmail {
            owner_name: owner.name.as_deref().unwrap_or("traveler"),
            destination: &trip.destination,
            starts_at: long_date(trip.starts_at),
            ends_at: long_date(trip.ends_at),
            details_link: self.trip_details_link(&trip.id, &owner.id),
        }
        .render()?;
        self.deliver(&owner.email, subject, html).await
    }

    /// Invitation with one-click confirm, manual confirm and details links.
    pub async fn send_invitation(
        &self,
        trip: &Trip,
        participant: &Participant,
    ) -> Result<(), AppError> {
        let subject = format!(
            "You're invited to {} on {}",
            trip.destination,
            long_date(trip.starts_at)
        );
        let html = InvitationEmail {
            destination: &trip.destination,
            starts_at: long_date(trip.starts_at),
            ends_at: long_date(trip.ends_at),
            confirm_link: self.confirm_link(&participant.id),
            manual_confirm_link: self.manual_confirm_link(&participant.id),
            details_link: self.trip_details_link(&trip.id, &participant.id),
        }
        .render()?;
        self.deliver(&participant.email, subject, html).await
    }

    /// Standalone invite: a single one-click confirmation link.
    pub async fn send_invite_confirmation(
        &self,
        trip: &Trip,
        participant: &Participant,
    ) -> Result<(), AppError> {
        let subject = format!(
            "Confirm your spot on the trip to {} on {}",
            trip.destination,
            long_date(trip.starts_at)
        );
        let html = InviteConfirmationEmail {
            destination: &trip.destination,
            starts_at: long_date(trip.starts_at),
            ends_at: long_date(trip.ends_at),
            confirm_link: self.confirm_link(&participant.id),
        }
        .render()?;
        self.deliver(&participant.email, subject, html).await
    }

    fn confirm_link(&self, participant_id: &str) -> String {
        format!("{}/participants/{participant_id}/confirm", self.api_base_url)
    }

    fn manual_confirm_link(&self, participant_id: &str) -> String {
        format!(
            "{}/participants/{participant_id}/manual-confirm",
            self.web_base_url
        )
    }

    fn trip_details_link(&self, trip_id: &str, participant_id: &str) -> String {
        format!(
            "{}/trips/{trip_id}?participantId={participant_id}",
            self.web_base_url
        )
    }

    async fn deliver(&self, to: &str, subject: String, html: String) -> Result<(), AppError> {
        let Some(transport) = &self.transport else {
            debug!(to, "mail transport disabled, dropping message");
            return Ok(());
        };
        let message = Message::builder()
            .from(self.sender.clone())
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)?;
        transport.send(message).await?;
        info!(to, "email sent");
        Ok(())
    }
}

fn long_date(value: DateTime<Utc>) -> String {
    value.format("%B %-d, %Y").to_string()
}
