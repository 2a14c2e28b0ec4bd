use evhop_core::backend::PassengerContact;
use evhop_shared::Masked;
use regex::Regex;
use std::sync::LazyLock;

// Optional `+` or `00` international prefix, then 8-15 digits.
static WHATSAPP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\+|00)?[0-9]{8,15}$").expect("valid whatsapp regex"));

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ContactError {
    #[error("Nama wajib diisi / Name is required")]
    MissingName,
    #[error("Nomor WhatsApp tidak valid / Invalid WhatsApp number")]
    InvalidWhatsapp,
}

/// Validate a WhatsApp number and return it with separators stripped.
///
/// Spaces, dashes and parentheses are ignored.
pub fn normalize_whatsapp(raw: &str) -> Result<String, ContactError> {
    let stripped: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();

    if WHATSAPP_RE.is_match(&stripped) {
        Ok(stripped)
    } else {
        Err(ContactError::InvalidWhatsapp)
    }
}

pub fn passenger_contact(
    name: &str,
    whatsapp: &str,
    email: Option<&str>,
) -> Result<PassengerContact, ContactError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ContactError::MissingName);
    }

    let whatsapp = normalize_whatsapp(whatsapp)?;
    let email = email
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(|e| Masked::new(e.to_string()));

    Ok(PassengerContact {
        name: name.to_string(),
        whatsapp: Masked::new(whatsapp),
        email,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_formats() {
        assert_eq!(normalize_whatsapp("+62 812 3456 7890").unwrap(), "+6281234567890");
        assert_eq!(normalize_whatsapp("0812-3456-7890").unwrap(), "081234567890");
        assert_eq!(normalize_whatsapp("(0812) 3456 7890").unwrap(), "081234567890");
        assert_eq!(normalize_whatsapp("0062 81234567").unwrap(), "006281234567");
    }

    #[test]
    fn test_rejects_short_and_non_numeric() {
        assert_eq!(normalize_whatsapp("123"), Err(ContactError::InvalidWhatsapp));
        assert_eq!(normalize_whatsapp("abc123456789"), Err(ContactError::InvalidWhatsapp));
        assert_eq!(normalize_whatsapp("+62 812 3456 7890 1234"), Err(ContactError::InvalidWhatsapp));
    }

    #[test]
    fn test_passenger_contact() {
        let contact = passenger_contact("  Made  ", "0812-3456-7890", Some(" ")).unwrap();
        assert_eq!(contact.name, "Made");
        assert_eq!(contact.whatsapp.expose(), "081234567890");
        assert!(contact.email.is_none());

        assert_eq!(
            passenger_contact("", "0812-3456-7890", None).unwrap_err(),
            ContactError::MissingName
        );
    }
}
