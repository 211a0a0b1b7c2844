use serde::Serialize;

/// Browsable catalog category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

/// The fixed category table, in display order
pub static CATEGORIES: [Category; 6] = [
    Category {
        id: "classics",
        name: "Classics",
        description: "Timeless masterpieces from renowned authors.",
    },
    Category {
        id: "modern",
        name: "Modern Literature",
        description: "Contemporary works from modern authors.",
    },
    Category {
        id: "poetry",
        name: "Poetry",
        description: "Beautiful poetry from literary giants.",
    },
    Category {
        id: "fiction",
        name: "Fiction",
        description: "Fictional works with universal appeal.",
    },
    Category {
        id: "fantasy",
        name: "Fantasy",
        description: "Magical and fantastical stories.",
    },
    Category {
        id: "science",
        name: "Science",
        description: "Scientific exploration and discovery.",
    },
];

impl Category {
    pub fn find(id: &str) -> Option<&'static Category> {
        CATEGORIES.iter().find(|category| category.id == id)
    }
}
