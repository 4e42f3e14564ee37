//! Email syntax validation.

use validator::ValidateEmail;

use crate::ports::outbound::EmailValidator;

/// [`EmailValidator`] backed by the HTML5 rules of [`validator`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SyntaxEmailValidator;

impl EmailValidator for SyntaxEmailValidator {
    fn is_valid(&self, email: &str) -> bool {
        email.validate_email()
    }
}
