//! # Checkout
//!
//! The shop takes payment over WhatsApp. Checkout freezes the cart into a
//! `pending` order, renders a plain-text summary and returns a `wa.me` link
//! that opens a chat with the shop with the summary already typed in.
use chrono::Utc;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::{
    accounts::{self, ContactDetails, normalize_phone, validate_address, validate_name},
    auth::AuthUser,
    cart::{self, CartView},
    database::next_order_sequence,
    error::AppError,
    orders::{self, NewOrder, Order, OrderItem, OrderStatus},
    state::AppState,
    wib::{day_code, to_wib},
};

const WHATSAPP_BASE: &str = "https://wa.me";
const MAX_NOTE_CHARS: usize = 500;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutRequest {
    pub customer_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub order: Order,
    pub message: String,
    pub whatsapp_url: String,
}

/// `25000` becomes `Rp 25.000`.
pub fn format_rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }

    let sign = if amount < 0 { "-" } else { "" };
    format!("{sign}Rp {grouped}")
}

pub fn order_code(day_code: &str, sequence: i64) -> String {
    format!("DN-{day_code}-{sequence:04}")
}

/// Request fields win over the profile, field by field.
pub fn resolve_contact(
    request: &CheckoutRequest,
    profile: &accounts::Profile,
) -> Result<ContactDetails, AppError> {
    let pick = |given: &Option<String>, stored: &Option<String>, field: &str| {
        given
            .clone()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| stored.clone())
            .ok_or_else(|| AppError::invalid(format!("Missing {field}")))
    };

    Ok(ContactDetails {
        full_name: validate_name(&pick(&request.customer_name, &profile.full_name, "name")?)?,
        phone: normalize_phone(&pick(&request.phone, &profile.phone, "phone")?)?,
        address: validate_address(&pick(&request.address, &profile.address, "address")?)?,
    })
}

pub fn order_items(cart: &CartView) -> Vec<OrderItem> {
    cart.lines
        .iter()
        .map(|line| OrderItem {
            product_id: line.product.product.id,
            name: line.product.product.name.clone(),
            quantity: line.quantity,
            unit_price: line.product.effective_price,
        })
        .collect()
}

pub fn render_message(order: &Order) -> String {
    let mut lines = vec![
        "Halo, saya mau pesan donat:".to_string(),
        format!("Kode pesanan: {}", order.code),
        String::new(),
    ];

    for item in &order.items {
        lines.push(format!(
            "- {} x{} @ {} = {}",
            item.name,
            item.quantity,
            format_rupiah(item.unit_price),
            format_rupiah(item.line_total())
        ));
    }

    lines.push(String::new());
    lines.push(format!("Total: {}", format_rupiah(order.total)));
    lines.push(String::new());
    lines.push(format!("Nama: {}", order.customer_name));
    lines.push(format!("No. HP: {}", order.phone));
    lines.push(format!("Alamat: {}", order.address));

    if let Some(note) = order.note.as_deref().filter(|note| !note.is_empty()) {
        lines.push(format!("Catatan: {note}"));
    }

    if let Some(created_at) = order.created_at {
        lines.push(format!("Waktu: {} WIB", to_wib(created_at).format("%d/%m/%Y %H:%M")));
    }

    lines.join("\n")
}

/// `shop_number` is already normalized by [`Config::load`](crate::config::Config::load).
pub fn whatsapp_url(shop_number: &str, message: &str) -> Result<String, AppError> {
    let url = Url::parse_with_params(&format!("{WHATSAPP_BASE}/{shop_number}"), &[("text", message)])
        .map_err(|e| AppError::Internal(format!("Bad WhatsApp link: {e}")))?;

    Ok(url.into())
}

pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    request: CheckoutRequest,
) -> Result<CheckoutResponse, AppError> {
    let note = request
        .note
        .as_deref()
        .map(str::trim)
        .filter(|note| !note.is_empty())
        .map(str::to_string);
    if note
        .as_ref()
        .is_some_and(|note| note.chars().count() > MAX_NOTE_CHARS)
    {
        return Err(AppError::invalid("Note is too long"));
    }

    let profile = accounts::get_or_create_profile(state, user).await?;
    let contact = resolve_contact(&request, &profile)?;

    let cart = cart::view_cart(state, &user.id).await?;
    if cart.is_empty() {
        return Err(AppError::invalid("Cart is empty"));
    }

    let mut connection = state.redis_connection.clone();
    let day = day_code(Utc::now());
    let sequence = next_order_sequence(&mut connection, &day).await?;

    let new_order = NewOrder {
        code: order_code(&day, sequence),
        user_id: user.id.clone(),
        customer_name: contact.full_name,
        phone: contact.phone,
        address: contact.address,
        note,
        items: order_items(&cart),
        total: cart.subtotal,
        status: OrderStatus::Pending,
    };

    let order = orders::create(state, &new_order).await?;
    let message = render_message(&order);
    let whatsapp_url = whatsapp_url(&state.config.whatsapp_number, &message)?;

    cart::clear(state, &user.id).await?;

    Ok(CheckoutResponse {
        order,
        message,
        whatsapp_url,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::accounts::{Profile, Role};

    fn profile() -> Profile {
        Profile {
            id: "u1".into(),
            email: None,
            full_name: Some("Sari Dewi".into()),
            phone: Some("081234567890".into()),
            address: Some("Jl. Melati No. 7, Bandung".into()),
            role: Role::Customer,
            points: 0,
            onboarded: true,
            created_at: None,
        }
    }

    fn order() -> Order {
        Order {
            id: 1,
            code: "DN-261019-0007".into(),
            user_id: "u1".into(),
            customer_name: "Sari Dewi".into(),
            phone: "6281234567890".into(),
            address: "Jl. Melati No. 7, Bandung".into(),
            note: Some("Tanpa gula halus".into()),
            items: vec![
                OrderItem {
                    product_id: 1,
                    name: "Glazed".into(),
                    quantity: 2,
                    unit_price: 12_000,
                },
                OrderItem {
                    product_id: 2,
                    name: "Box Isi 6".into(),
                    quantity: 1,
                    unit_price: 65_000,
                },
            ],
            total: 89_000,
            status: OrderStatus::Pending,
            created_at: Some(Utc.with_ymd_and_hms(2026, 10, 19, 3, 30, 0).unwrap()),
            updated_at: None,
        }
    }

    #[test]
    fn test_format_rupiah() {
        assert_eq!(format_rupiah(0), "Rp 0");
        assert_eq!(format_rupiah(500), "Rp 500");
        assert_eq!(format_rupiah(25_000), "Rp 25.000");
        assert_eq!(format_rupiah(1_250_000), "Rp 1.250.000");
        assert_eq!(format_rupiah(-5_000), "-Rp 5.000");
    }

    #[test]
    fn test_order_code() {
        assert_eq!(order_code("261019", 7), "DN-261019-0007");
        assert_eq!(order_code("261019", 12345), "DN-261019-12345");
    }

    #[test]
    fn test_render_message() {
        let message = render_message(&order());

        assert!(message.contains("Kode pesanan: DN-261019-0007"));
        assert!(message.contains("- Glazed x2 @ Rp 12.000 = Rp 24.000"));
        assert!(message.contains("Total: Rp 89.000"));
        assert!(message.contains("Catatan: Tanpa gula halus"));
        assert!(message.ends_with("Waktu: 19/10/2026 10:30 WIB"));
    }

    #[test]
    fn test_whatsapp_url_encodes_message() {
        let url = whatsapp_url("6281200001111", "Halo & total: Rp 5.000\nOK").unwrap();

        assert!(url.starts_with("https://wa.me/6281200001111?text="));
        assert!(!url.contains(' '));
        assert!(!url.contains('\n'));
        assert!(url.contains("%26"));
    }

    #[test]
    fn test_resolve_contact_prefers_request() {
        let request = CheckoutRequest {
            phone: Some("+62 811 2222 3333".into()),
            ..Default::default()
        };

        let contact = resolve_contact(&request, &profile()).unwrap();
        assert_eq!(contact.full_name, "Sari Dewi");
        assert_eq!(contact.phone, "6281122223333");
    }

    #[test]
    fn test_resolve_contact_requires_details() {
        let empty = Profile {
            full_name: None,
            phone: None,
            address: None,
            onboarded: false,
            ..profile()
        };

        let request = CheckoutRequest {
            customer_name: Some("Budi".into()),
            ..Default::default()
        };
        assert!(resolve_contact(&request, &empty).is_err());
    }
}
