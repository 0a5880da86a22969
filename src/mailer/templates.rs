//! Outbound mail bodies: a shared HTML layout plus one named body per
//! mail kind.

pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

fn layout(app_name: &str, title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h1 style="color: #333;">{title}</h1>
    {body}
    <hr style="border: none; border-top: 1px solid #eee; margin: 30px 0;">
    <p style="color: #999; font-size: 12px;">This email was sent by {app_name}. If you did not expect it, you can safely ignore it.</p>
</body>
</html>"#
    )
}

pub fn verification_email(app_name: &str, client_url: &str, token: &str) -> RenderedEmail {
    let verify_url = format!("{client_url}/auth/verify?token={token}");
    let body = format!(
        r#"<p>Thank you for signing up. Please verify your email address by clicking the button below:</p>
    <p style="text-align: center; margin: 30px 0;">
        <a href="{verify_url}" style="background-color: #4CAF50; color: white; padding: 12px 24px; text-decoration: none; border-radius: 4px; display: inline-block;">Verify Email Address</a>
    </p>
    <p>Or copy this link into your browser: {verify_url}</p>"#
    );
    RenderedEmail {
        subject: format!("Your verification code {app_name}"),
        html: layout(app_name, &format!("Welcome to {app_name}!"), &body),
    }
}

pub fn password_reset_email(app_name: &str, client_url: &str, token: &str) -> RenderedEmail {
    let reset_url = format!("{client_url}/auth/reset-password?token={token}");
    let body = format!(
        r#"<p>A password reset was requested for your account. Click the button below to choose a new password:</p>
    <p style="text-align: center; margin: 30px 0;">
        <a href="{reset_url}" style="background-color: #2196F3; color: white; padding: 12px 24px; text-decoration: none; border-radius: 4px; display: inline-block;">Reset Password</a>
    </p>
    <p>Or copy this link into your browser: {reset_url}</p>"#
    );
    RenderedEmail {
        subject: format!("Reset your {app_name} password"),
        html: layout(app_name, "Password reset", &body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_email_contains_link_and_token() {
        let mail = verification_email("gatekit", "http://localhost:3000", "tok-abc");
        assert!(mail.subject.contains("gatekit"));
        assert!(mail
            .html
            .contains("http://localhost:3000/auth/verify?token=tok-abc"));
    }

    #[test]
    fn reset_email_contains_link_and_token() {
        let mail = password_reset_email("gatekit", "http://localhost:3000", "tok-xyz");
        assert!(mail.subject.contains("gatekit"));
        assert!(mail
            .html
            .contains("http://localhost:3000/auth/reset-password?token=tok-xyz"));
    }

    #[test]
    fn bodies_share_the_layout() {
        let verify = verification_email("gatekit", "http://c", "t");
        let reset = password_reset_email("gatekit", "http://c", "t");
        for mail in [&verify, &reset] {
            assert!(mail.html.starts_with("<!DOCTYPE html>"));
            assert!(mail.html.contains("sent by gatekit"));
        }
    }
}
