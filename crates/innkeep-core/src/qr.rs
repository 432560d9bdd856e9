//! # Bank-Transfer QR
//!
//! Pure rendering of the QR transfer instructions shown to a guest paying a
//! deposit. The image itself is produced by the VietQR image service from
//! the link built here; nothing in this module performs I/O.
//!
//! ```text
//!   BankAccount ─┐
//!   amount ──────┼──► TransferQr { bank, account, amount, reference, image_url }
//!   token ───────┘                                  │
//!                                     "DEPOSIT 3f2a…"  (token embedded)
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use url::Url;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

const QR_IMAGE_BASE: &str = "https://img.vietqr.io/image";
const QR_TEMPLATE: &str = "compact2";
const REFERENCE_PREFIX: &str = "DEPOSIT";

/// Receiving bank account for QR deposits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BankAccount {
    /// Bank short code or BIN, e.g. "VCB" or "970436".
    pub bank_id: String,
    pub account_no: String,
    pub account_name: String,
}

impl BankAccount {
    pub fn is_configured(&self) -> bool {
        !self.bank_id.trim().is_empty()
            && !self.account_no.trim().is_empty()
            && !self.account_name.trim().is_empty()
    }
}

/// Everything a client needs to draw and explain the transfer QR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransferQr {
    pub bank_id: String,
    pub account_no: String,
    pub account_name: String,
    pub amount: Money,
    /// Transfer note the guest must keep; embeds the payment token.
    pub reference: String,
    pub image_url: String,
}

/// Transfer note for a payment token.
pub fn transfer_reference(payment_token: &str) -> String {
    format!("{} {}", REFERENCE_PREFIX, payment_token)
}

/// Builds the transfer QR for a deposit.
///
/// ## Example
/// ```rust
/// use innkeep_core::money::Money;
/// use innkeep_core::qr::{render_transfer_qr, BankAccount};
///
/// let bank = BankAccount {
///     bank_id: "VCB".into(),
///     account_no: "0123456789".into(),
///     account_name: "KHACH SAN AN BINH".into(),
/// };
/// let qr = render_transfer_qr(&bank, Money::from_dong(300_000), "abc123").unwrap();
/// assert_eq!(qr.reference, "DEPOSIT abc123");
/// assert!(qr.image_url.starts_with("https://img.vietqr.io/image/VCB-0123456789-compact2.png?"));
/// ```
pub fn render_transfer_qr(
    bank: &BankAccount,
    amount: Money,
    payment_token: &str,
) -> CoreResult<TransferQr> {
    if bank.bank_id.trim().is_empty() {
        return Err(CoreError::BankNotConfigured("bank_id"));
    }
    if bank.account_no.trim().is_empty() {
        return Err(CoreError::BankNotConfigured("account_no"));
    }
    if bank.account_name.trim().is_empty() {
        return Err(CoreError::BankNotConfigured("account_name"));
    }

    let reference = transfer_reference(payment_token);
    let base = format!(
        "{}/{}-{}-{}.png",
        QR_IMAGE_BASE,
        bank.bank_id.trim(),
        bank.account_no.trim(),
        QR_TEMPLATE
    );
    let amount_param = amount.dong().to_string();
    let image_url = Url::parse_with_params(
        &base,
        &[
            ("amount", amount_param.as_str()),
            ("addInfo", reference.as_str()),
            ("accountName", bank.account_name.trim()),
        ],
    )?;

    Ok(TransferQr {
        bank_id: bank.bank_id.trim().to_string(),
        account_no: bank.account_no.trim().to_string(),
        account_name: bank.account_name.trim().to_string(),
        amount,
        reference,
        image_url: image_url.into(),
    })
}
