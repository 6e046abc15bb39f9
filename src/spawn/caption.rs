use crate::domain::Collectible;
use crate::pricing::{CopyView, Rarity};

/// Everything shown in a spawn announcement
#[derive(Debug, Clone)]
pub struct CaptionInput<'a> {
    pub collectible: &'a Collectible,
    pub rarity: Rarity,
    pub copy_number: u32,
    pub max_copies: u32,
    pub price: u64,
    pub claim_command: &'a str,
    pub claim_window_mins: u64,
}

/// Render the spawn caption
pub fn render(input: &CaptionInput<'_>) -> String {
    let c = input.collectible;
    let mut lines = vec![
        "🎴 *A wild card appeared!*".to_string(),
        String::new(),
        format!("{} *{}*", c.tier.stars(), c.name),
        format!("🆔 {} · Tier {}", c.id, c.tier),
        format!("📚 {} · by {}", c.series, c.creator),
        format!(
            "💎 {} · Copy #{}/{}",
            input.rarity, input.copy_number, input.max_copies
        ),
        format!("💰 {} coins", format_coins(input.price)),
    ];
    if let Some(text) = c.description.as_deref().filter(|t| !t.trim().is_empty()) {
        lines.push(String::new());
        lines.push(format!("_{}_", text.trim()));
    }
    lines.push(String::new());
    lines.push(format!(
        "Type `{} {}` within {} minutes to claim it!",
        input.claim_command, c.id, input.claim_window_mins
    ));
    lines.join("\n")
}

/// Chat reply announcing who caught a spawn
pub fn claim_reply(claimant: &str, view: &CopyView, first_copy: bool) -> String {
    let mut text = format!(
        "🎉 {} caught {} *{}* · {} #{}/{} · worth {} coins",
        claimant,
        view.tier.stars(),
        view.name,
        view.rarity,
        view.copy_number,
        view.max_copies,
        format_coins(view.price)
    );
    if first_copy {
        text.push_str("\n🆕 New to their collection!");
    }
    text
}

/// 1234567 -> "1,234,567"
pub fn format_coins(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
