use crate::{
    config::Config,
    scrape::{Driver, fill_login_form, submit_form, wait_for_element},
};

#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Signs in through the login form. A missing post-login marker surfaces as
/// [`crate::Error::Timeout`].
pub async fn login<D: Driver>(
    driver: &D,
    config: &Config,
    credentials: &Credentials,
) -> anyhow::Result<()> {
    tracing::info!(target: "login", "logging in as \x1b[36m{}\x1b[0m ...", credentials.user);

    driver.navigate(&config.login_url).await?;
    fill_login_form(
        driver,
        (config.user_field.as_str(), credentials.user.as_str()),
        (config.password_field.as_str(), credentials.password.as_str()),
    )
    .await?;
    submit_form(driver, &config.submit).await?;
    wait_for_element(
        driver,
        &config.login_marker,
        config.wait_timeout,
        config.poll_interval,
    )
    .await?;

    tracing::info!(target: "login", "logged in");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_password() {
        let credentials = Credentials {
            user: "team42".to_owned(),
            password: "hunter2".to_owned(),
        };
        let shown = format!("{credentials:?}");
        assert!(shown.contains("team42"));
        assert!(!shown.contains("hunter2"));
    }
}
