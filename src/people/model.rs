use serde::{Deserialize, Serialize};

/// A character record as served by the Star Wars API.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct People {
    pub name: String,
    #[serde(default)]
    pub height: String,
    #[serde(default)]
    pub mass: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub homeworld: String,
}

/// Envelope of the search and listing endpoints. Other envelope fields (`count`, `next`, ...)
/// are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PeopleResults {
    #[serde(rename = "results", default)]
    pub peoples: Vec<People>,
}

impl PeopleResults {
    /// The entry answering a search for `name`: an exact (ASCII case-insensitive) match if there
    /// is one, otherwise the first result.
    pub fn best_match(self, name: &str) -> Option<People> {
        let mut peoples = self.peoples;
        match peoples.iter().position(|p| p.name.eq_ignore_ascii_case(name)) {
            Some(pos) => Some(peoples.swap_remove(pos)),
            None => peoples.into_iter().next(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_envelope_and_ignores_extra_fields() {
        let json = r#"{
            "count": 2,
            "next": null,
            "results": [
                {"name": "Luke Skywalker", "height": "172", "mass": "77", "gender": "male",
                 "homeworld": "https://swapi.dev/api/planets/1/", "films": []},
                {"name": "Leia Organa"}
            ]
        }"#;
        let results: PeopleResults = serde_json::from_str(json).unwrap();
        assert_eq!(results.peoples.len(), 2);
        assert_eq!(results.peoples[0].height, "172");
        assert_eq!(results.peoples[1].gender, "");
    }

    #[test]
    fn best_match_prefers_exact_name() {
        let results = PeopleResults {
            peoples: vec![
                People { name: "Darth Vader".to_owned(), ..Default::default() },
                People { name: "Darth Maul".to_owned(), ..Default::default() },
            ],
        };
        assert_eq!(results.clone().best_match("darth maul").unwrap().name, "Darth Maul");
        assert_eq!(results.best_match("Darth").unwrap().name, "Darth Vader");
        assert_eq!(PeopleResults::default().best_match("Yoda"), None);
    }
}
