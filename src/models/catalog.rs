use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanInterval {
    Monthly,
    Yearly,
}

impl PlanInterval {
    /// Stripe `recurring[interval]` value.
    pub fn stripe_interval(&self) -> &'static str {
        match self {
            PlanInterval::Monthly => "month",
            PlanInterval::Yearly => "year",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionPlan {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub price: Decimal,
    pub currency: &'static str,
    pub interval: PlanInterval,
    pub features: Vec<&'static str>,
}

impl SubscriptionPlan {
    pub fn all() -> Vec<SubscriptionPlan> {
        vec![
            SubscriptionPlan {
                id: "basic",
                name: "Basic Hero",
                description: "Essential CryptoQuest features",
                price: Decimal::new(999, 2),
                currency: "usd",
                interval: PlanInterval::Monthly,
                features: vec![
                    "Basic character progression",
                    "Standard quests access",
                    "Community guild participation",
                    "Mobile app access",
                ],
            },
            SubscriptionPlan {
                id: "premium",
                name: "Legendary Warrior",
                description: "Advanced gaming with exclusive content",
                price: Decimal::new(1999, 2),
                currency: "usd",
                interval: PlanInterval::Monthly,
                features: vec![
                    "Enhanced character abilities",
                    "Exclusive quest lines",
                    "Premium guild features",
                    "Cross-platform sync",
                    "NFT trading privileges",
                    "Priority customer support",
                ],
            },
            SubscriptionPlan {
                id: "ultimate",
                name: "Mythic Champion",
                description: "Ultimate CryptoQuest experience",
                price: Decimal::new(3999, 2),
                currency: "usd",
                interval: PlanInterval::Monthly,
                features: vec![
                    "All premium features",
                    "Early access to new content",
                    "Exclusive mythic items",
                    "Private server access",
                    "Direct developer communication",
                    "Custom avatar creation",
                    "Advanced analytics dashboard",
                ],
            },
            SubscriptionPlan {
                id: "annual_premium",
                name: "Legendary Warrior (Annual)",
                description: "Annual subscription with 2 months free",
                price: Decimal::new(19999, 2),
                currency: "usd",
                interval: PlanInterval::Yearly,
                features: vec![
                    "All Legendary Warrior features",
                    "2 months free (20% savings)",
                    "Annual exclusive NFT drop",
                    "Priority event access",
                ],
            },
        ]
    }

    pub fn find(plan_id: &str) -> Option<SubscriptionPlan> {
        Self::all().into_iter().find(|plan| plan.id == plan_id.trim())
    }

    /// Amount in the smallest currency unit (cents).
    pub fn unit_amount_cents(&self) -> i64 {
        to_cents(self.price)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MerchCategory {
    Apparel,
    Accessories,
    Collectibles,
    Digital,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MerchVariants {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Vec<&'static str>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchItem {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub price: Decimal,
    pub currency: &'static str,
    pub category: MerchCategory,
    pub image_url: &'static str,
    pub in_stock: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variants: Option<MerchVariants>,
}

impl MerchItem {
    pub fn catalog() -> Vec<MerchItem> {
        vec![
            MerchItem {
                id: "tshirt_hero",
                name: "CryptoQuest Hero T-Shirt",
                description: "Premium cotton t-shirt with exclusive Hero design",
                price: Decimal::new(2499, 2),
                currency: "usd",
                category: MerchCategory::Apparel,
                image_url: "/merch/tshirt-hero.jpg",
                in_stock: true,
                variants: Some(MerchVariants {
                    size: Some(vec!["XS", "S", "M", "L", "XL", "XXL"]),
                    color: Some(vec!["Black", "Navy", "Forest Green"]),
                }),
            },
            MerchItem {
                id: "hoodie_guild",
                name: "Guild Master Hoodie",
                description: "Premium hoodie with embroidered guild crest",
                price: Decimal::new(4999, 2),
                currency: "usd",
                category: MerchCategory::Apparel,
                image_url: "/merch/hoodie-guild.jpg",
                in_stock: true,
                variants: Some(MerchVariants {
                    size: Some(vec!["S", "M", "L", "XL", "XXL"]),
                    color: Some(vec!["Black", "Charcoal", "Burgundy"]),
                }),
            },
            MerchItem {
                id: "mug_shards",
                name: "Shards of Genesis Mug",
                description: "Ceramic mug with color-changing Shards design",
                price: Decimal::new(1499, 2),
                currency: "usd",
                category: MerchCategory::Accessories,
                image_url: "/merch/mug-shards.jpg",
                in_stock: true,
                variants: None,
            },
            MerchItem {
                id: "poster_map",
                name: "CryptoQuest World Map Poster",
                description: "High-quality print of the complete game world",
                price: Decimal::new(1999, 2),
                currency: "usd",
                category: MerchCategory::Collectibles,
                image_url: "/merch/poster-map.jpg",
                in_stock: true,
                variants: Some(MerchVariants {
                    size: Some(vec!["18x24", "24x36"]),
                    color: None,
                }),
            },
            MerchItem {
                id: "keychain_token",
                name: "CQT Token Keychain",
                description: "Metal keychain replica of the CQT token",
                price: Decimal::new(999, 2),
                currency: "usd",
                category: MerchCategory::Accessories,
                image_url: "/merch/keychain-token.jpg",
                in_stock: true,
                variants: None,
            },
            MerchItem {
                id: "artbook_digital",
                name: "Digital Art Book Collection",
                description: "Complete digital art collection with concept art",
                price: Decimal::new(2999, 2),
                currency: "usd",
                category: MerchCategory::Digital,
                image_url: "/merch/artbook-digital.jpg",
                in_stock: true,
                variants: None,
            },
        ]
    }

    pub fn find(item_id: &str) -> Option<MerchItem> {
        Self::catalog().into_iter().find(|item| item.id == item_id.trim())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub item_id: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<serde_json::Value>,
}

/// Total price of a merch order in USD.
pub fn order_total(items: &[OrderItem]) -> Result<Decimal> {
    if items.is_empty() {
        return Err(AppError::BadRequest("Order must contain at least one item".to_string()));
    }

    let mut total = Decimal::ZERO;
    for item in items {
        if item.quantity == 0 {
            return Err(AppError::BadRequest(format!(
                "Quantity for {} must be at least 1",
                item.item_id
            )));
        }
        let merch = MerchItem::find(&item.item_id)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown merch item: {}", item.item_id)))?;
        if !merch.in_stock {
            return Err(AppError::BadRequest(format!("{} is out of stock", merch.name)));
        }
        total += merch.price * Decimal::from(item.quantity);
    }
    Ok(total)
}

pub fn to_cents(amount: Decimal) -> i64 {
    (amount * Decimal::ONE_HUNDRED).round().to_i64().unwrap_or(0)
}
