//! Curated gift ideas used when no language model is available or it fails.

use std::collections::HashSet;

use db::models::friend::Friend;
use once_cell::sync::Lazy;
use regex::Regex;

use super::gift_recommendation::GiftRecommendation;

struct Idea {
    name: &'static str,
    description: &'static str,
    price: u32,
}

struct Category {
    label: &'static str,
    keywords: &'static [&'static str],
    ideas: &'static [Idea],
}

const fn idea(name: &'static str, description: &'static str, price: u32) -> Idea {
    Idea {
        name,
        description,
        price,
    }
}

const CATEGORIES: &[Category] = &[
    Category {
        label: "Outdoors",
        keywords: &["hik", "camp", "outdoor", "nature", "climb", "adventur", "trail", "fish"],
        ideas: &[
            idea("Rechargeable Headlamp", "Bright, lightweight headlamp for early starts and late finishes.", 35),
            idea("Insulated Trail Bottle", "Keeps drinks cold for a full day on the trail.", 30),
            idea("National Parks Pass", "A year of entry to parks across the country.", 80),
            idea("Ultralight Hammock", "Packs down small and sets up between any two trees.", 60),
        ],
    },
    Category {
        label: "Cooking",
        keywords: &["cook", "bak", "food", "chef", "kitchen", "foodie", "grill"],
        ideas: &[
            idea("Cast Iron Skillet", "A pan that lasts a lifetime and gets better with use.", 40),
            idea("Regional Spice Sampler", "Twelve small-batch spice blends from around the world.", 28),
            idea("Cooking Class for Two", "Hands-on class with a local chef.", 120),
            idea("Digital Instant-Read Thermometer", "Takes the guesswork out of roasts and bakes.", 25),
        ],
    },
    Category {
        label: "Tech",
        keywords: &["tech", "gadget", "computer", "code", "program", "engineer", "science"],
        ideas: &[
            idea("Wireless Charging Stand", "Charges a phone upright on the desk or nightstand.", 35),
            idea("Noise-Cancelling Earbuds", "Quiet commutes and focused work sessions.", 150),
            idea("Smart Plug Set", "Voice and app control for lamps and small appliances.", 30),
            idea("Mechanical Keyboard", "Satisfying, durable keys for long typing sessions.", 90),
        ],
    },
    Category {
        label: "Books",
        keywords: &["read", "book", "writ", "literat", "poet", "curious", "intellect"],
        ideas: &[
            idea("E-Reader", "A whole library in a pocket with a glare-free screen.", 110),
            idea("Book Subscription Box", "A hand-picked novel delivered every month.", 45),
            idea("Leather Journal", "Refillable journal for notes, sketches and ideas.", 32),
            idea("Reading Light", "Clip-on warm light that will not disturb anyone else.", 20),
        ],
    },
    Category {
        label: "Music",
        keywords: &["music", "guitar", "piano", "sing", "concert", "vinyl", "band"],
        ideas: &[
            idea("Vinyl Record Cleaning Kit", "Keeps a collection sounding its best.", 25),
            idea("Portable Bluetooth Speaker", "Room-filling sound that survives a splash.", 70),
            idea("Concert Tickets", "A night out to see a favourite artist live.", 100),
            idea("Online Music Lessons", "A few months of lessons on the instrument of their choice.", 60),
        ],
    },
    Category {
        label: "Art & Creativity",
        keywords: &["art", "paint", "draw", "creativ", "craft", "design", "photo", "artistic"],
        ideas: &[
            idea("Watercolor Travel Set", "Compact paints and brushes for sketching anywhere.", 35),
            idea("Instant Camera", "Prints memories on the spot.", 75),
            idea("Pottery Workshop", "An afternoon at the wheel with a local studio.", 85),
            idea("Premium Sketchbook Set", "Heavyweight paper that handles ink and wash.", 24),
        ],
    },
    Category {
        label: "Fitness",
        keywords: &["fit", "gym", "run", "yoga", "sport", "cycl", "athlet", "active", "energetic"],
        ideas: &[
            idea("Yoga Mat and Strap", "Non-slip mat with a carry strap.", 45),
            idea("Fitness Tracker", "Tracks steps, sleep and workouts.", 90),
            idea("Massage Gun", "Quick recovery after hard sessions.", 110),
            idea("Insulated Gym Bottle", "Keeps water cold through the longest workout.", 22),
        ],
    },
    Category {
        label: "Travel",
        keywords: &["travel", "explor", "wanderlust", "trip", "language", "culture"],
        ideas: &[
            idea("Packing Cube Set", "Keeps a suitcase tidy on every trip.", 28),
            idea("Scratch-Off World Map", "Reveals every country they have visited.", 30),
            idea("Universal Travel Adapter", "One plug for outlets in over 150 countries.", 25),
            idea("Carry-On Weekender Bag", "Sturdy bag sized for overhead bins.", 95),
        ],
    },
    Category {
        label: "Gaming",
        keywords: &["gam", "video game", "board game", "puzzle", "strateg", "competitive"],
        ideas: &[
            idea("Cooperative Board Game", "A modern classic for game nights with friends.", 40),
            idea("Gaming Headset", "Clear chat and immersive sound.", 70),
            idea("1000-Piece Puzzle", "A challenging puzzle with stunning artwork.", 20),
            idea("Game Store Gift Card", "Let them pick the next title on their list.", 50),
        ],
    },
    Category {
        label: "Wellness",
        keywords: &["relax", "calm", "meditat", "wellness", "spa", "self-care", "mindful", "introvert"],
        ideas: &[
            idea("Aromatherapy Diffuser", "Fills a room with calming scents.", 35),
            idea("Weighted Blanket", "Cozy, calming weight for better rest.", 80),
            idea("Spa Day Voucher", "A day of massages and quiet.", 120),
            idea("Meditation App Subscription", "A year of guided sessions.", 60),
        ],
    },
    Category {
        label: "Coffee & Tea",
        keywords: &["coffee", "tea", "espresso", "latte", "cafe"],
        ideas: &[
            idea("Pour-Over Coffee Kit", "Dripper, filters and a gooseneck kettle.", 55),
            idea("Loose Leaf Tea Sampler", "A tour of green, black and herbal teas.", 30),
            idea("Specialty Coffee Subscription", "Fresh beans from a new roaster every month.", 45),
            idea("Handmade Ceramic Mug", "A one-of-a-kind mug for the morning ritual.", 28),
        ],
    },
    Category {
        label: "Home & Garden",
        keywords: &["garden", "plant", "home", "decor", "homebody", "cozy", "organiz"],
        ideas: &[
            idea("Indoor Herb Garden", "Self-watering planter with basil, mint and parsley.", 50),
            idea("Scented Candle Set", "Three hand-poured candles in seasonal scents.", 32),
            idea("Plant Subscription", "A new easy-care houseplant each month.", 40),
            idea("Gardening Tool Set", "Ergonomic trowel, pruners and gloves.", 35),
        ],
    },
    Category {
        label: "Pets",
        keywords: &["dog", "cat", "pet", "animal", "puppy", "kitten"],
        ideas: &[
            idea("Custom Pet Portrait", "An illustrated portrait of their companion.", 60),
            idea("Interactive Pet Toy", "Keeps a pet busy and entertained.", 25),
            idea("Personalized Pet Bed", "A cozy bed with the pet's name stitched on.", 55),
        ],
    },
    Category {
        label: "Fashion",
        keywords: &["fashion", "style", "cloth", "jewel", "stylish", "trendy", "shoe"],
        ideas: &[
            idea("Minimalist Watch", "Clean design that goes with everything.", 85),
            idea("Cashmere Scarf", "Soft, warm and timeless.", 70),
            idea("Leather Card Wallet", "Slim wallet for everyday carry.", 35),
        ],
    },
];

/// Used when nothing in the profile matches a category.
const GENERAL: Category = Category {
    label: "Experiences",
    keywords: &[],
    ideas: &[
        idea("Experience Gift Card", "Lets them choose a class, tour or tasting.", 75),
        idea("Personalized Photo Book", "Favourite shared memories printed and bound.", 45),
        idea("Gourmet Chocolate Box", "Assorted truffles from an artisan chocolatier.", 30),
        idea("Monthly Snack Box", "A surprise selection of treats from around the world.", 35),
        idea("Cozy Throw Blanket", "Soft knit blanket for the couch.", 40),
    ],
};

static AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("valid amount regex"));

/// Upper price bound (USD) from budget text such as `"$50"`, `"under 100"`
/// or `"$25-$75"`. Open-ended budgets like `"$100+"` have no ceiling.
pub fn parse_budget_ceiling(budget: &str) -> Option<u32> {
    let budget = budget.trim().to_lowercase();
    if budget.ends_with('+') || budget.contains("over") || budget.contains("more than") {
        return None;
    }
    AMOUNT
        .find_iter(&budget)
        .filter_map(|m| m.as_str().replace(',', "").parse::<f64>().ok())
        .max_by(f64::total_cmp)
        .map(|max| max.floor() as u32)
}

struct Scored<'a> {
    category: &'a Category,
    score: u32,
    matched: Option<String>,
}

fn score(category: &Category, interests: &[String], traits: &[String]) -> (u32, Option<String>) {
    let mut score = 0;
    let mut matched = None;
    for (tags, weight) in [(interests, 2), (traits, 1)] {
        for tag in tags {
            let lower = tag.to_lowercase();
            if category.keywords.iter().any(|k| lower.contains(k)) {
                score += weight;
                matched.get_or_insert_with(|| tag.clone());
            }
        }
    }
    (score, matched)
}

/// Picks `count` ideas for the friend from the best-matching categories,
/// skipping ideas above the budget ceiling and names in `exclude`.
pub fn recommend(
    friend: &Friend,
    budget: Option<&str>,
    occasion: Option<&str>,
    exclude: &[String],
    count: usize,
) -> Vec<GiftRecommendation> {
    let mut ranked: Vec<Scored> = CATEGORIES
        .iter()
        .map(|category| {
            let (score, matched) = score(category, &friend.interests, &friend.personality_traits);
            Scored {
                category,
                score,
                matched,
            }
        })
        .filter(|s| s.score > 0)
        .collect();
    // Stable sort keeps table order for ties.
    ranked.sort_by_key(|s| std::cmp::Reverse(s.score));
    ranked.push(Scored {
        category: &GENERAL,
        score: 0,
        matched: None,
    });

    let ceiling = budget.and_then(parse_budget_ceiling);
    let mut seen: HashSet<String> = exclude.iter().map(|n| n.to_lowercase()).collect();
    let mut picks = Vec::with_capacity(count);
    let deepest = ranked.iter().map(|s| s.category.ideas.len()).max().unwrap_or(0);

    'rounds: for round in 0..deepest {
        for scored in &ranked {
            if picks.len() >= count {
                break 'rounds;
            }
            let Some(idea) = scored.category.ideas.get(round) else {
                continue;
            };
            if ceiling.is_some_and(|max| idea.price > max) || !seen.insert(idea.name.to_lowercase()) {
                continue;
            }
            picks.push(GiftRecommendation {
                name: idea.name.to_string(),
                description: idea.description.to_string(),
                price: format!("${}", idea.price),
                reasoning: reasoning(&friend.name, scored.matched.as_deref(), occasion),
                category: scored.category.label.to_string(),
                image_url: None,
                purchase_url: None,
            });
        }
    }
    picks
}

fn reasoning(name: &str, matched: Option<&str>, occasion: Option<&str>) -> String {
    let base = match matched {
        Some(tag) => format!("A great fit for {name}'s love of {}.", tag.to_lowercase()),
        None => format!("A thoughtful, versatile pick that {name} can enjoy right away."),
    };
    match occasion.map(str::trim).filter(|o| !o.is_empty()) {
        Some(occasion) => format!("{base} Perfect for a {}.", occasion.to_lowercase()),
        None => base,
    }
}
