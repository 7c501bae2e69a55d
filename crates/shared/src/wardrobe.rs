use crate::domain::WardrobeItem;

/// Garments offered before the user uploads any of their own.
pub fn default_wardrobe() -> Vec<WardrobeItem> {
    vec![
        WardrobeItem::new(
            "gemini-sweat",
            "Gemini Sweatshirt",
            "https://raw.githubusercontent.com/ammaarreshi/app-images/refs/heads/main/gemini-sweat-2.png",
        ),
        WardrobeItem::new(
            "gemini-tee",
            "Gemini T-Shirt",
            "https://raw.githubusercontent.com/ammaarreshi/app-images/refs/heads/main/Gemini-tee.png",
        ),
        WardrobeItem::new(
            "denim-jacket",
            "Denim Jacket",
            "https://images.unsplash.com/photo-1576871337632-b9aef4c17ab9?auto=format&fit=crop&w=800&q=80",
        ),
        WardrobeItem::new(
            "red-dress",
            "Red Dress",
            "https://images.unsplash.com/photo-1595777457583-95e059d581b8?auto=format&fit=crop&w=800&q=80",
        ),
        WardrobeItem::new(
            "classic-jeans",
            "Classic Jeans",
            "https://images.unsplash.com/photo-1542272454315-4c01d7abdf4a?auto=format&fit=crop&w=800&q=80",
        ),
        WardrobeItem::new(
            "black-blazer",
            "Black Blazer",
            "https://images.unsplash.com/photo-1591047139829-d91aecb6caea?auto=format&fit=crop&w=800&q=80",
        ),
        WardrobeItem::new(
            "panama-hat",
            "Panama Hat",
            "https://images.unsplash.com/photo-1514327605112-b887c0e61c0a?auto=format&fit=crop&w=800&q=80",
        ),
        WardrobeItem::new(
            "pleated-skirt",
            "Pleated Skirt",
            "https://images.unsplash.com/photo-1583496661160-fb5886a0aaaa?auto=format&fit=crop&w=800&q=80",
        ),
    ]
}

pub fn find_item<'a>(wardrobe: &'a [WardrobeItem], id: &str) -> Option<&'a WardrobeItem> {
    wardrobe.iter().find(|item| item.id.as_str() == id)
}
