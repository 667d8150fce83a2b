use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Programme {
    Undergraduate,
    Postgraduate,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Branch {
    pub category: Programme,
    pub name: &'static str,
    pub code: &'static str,
}

pub const BRANCHES: [Branch; 7] = [
    Branch {
        category: Programme::Undergraduate,
        name: "Computer Science & Engineering",
        code: "CSE",
    },
    Branch {
        category: Programme::Undergraduate,
        name: "Mechanical Engineering",
        code: "ME",
    },
    Branch {
        category: Programme::Undergraduate,
        name: "Electronics & Communication Engineering",
        code: "ECE",
    },
    Branch {
        category: Programme::Undergraduate,
        name: "Electrical & Electronics Engineering",
        code: "EEE",
    },
    Branch {
        category: Programme::Undergraduate,
        name: "Civil Engineering",
        code: "CE",
    },
    Branch {
        category: Programme::Undergraduate,
        name: "Artificial Intelligence & Machine Learning",
        code: "AIML",
    },
    Branch {
        category: Programme::Postgraduate,
        name: "Masters in Business Administration",
        code: "MBA",
    },
];

pub const ODD_SEMESTERS: [i64; 4] = [1, 3, 5, 7];
pub const EVEN_SEMESTERS: [i64; 4] = [2, 4, 6, 8];

pub fn branches_in(category: Programme) -> impl Iterator<Item = &'static Branch> {
    BRANCHES.iter().filter(move |b| b.category == category)
}
