use crate::models::{Event, EventCategory, TeamSize};
use crate::services::store::Store;

/// Seed do catálogo padrão.
/// Só insere se a collection `events` estiver vazia; erros só geram log.
pub async fn seed_default_events(store: &dyn Store) {
    let count = match store.count_events().await {
        Ok(count) => count,
        Err(e) => {
            log::error!("   ❌ Could not count events, skipping seed: {}", e);
            return;
        }
    };

    if count > 0 {
        log::info!("📅 Events: {} already in DB, skipping seed", count);
        return;
    }

    let events = build_default_events();
    log::info!("📅 Events: seeding {} default events...", events.len());

    match store.insert_events(events).await {
        Ok(inserted) => log::info!("   ✅ Inserted {} default events", inserted),
        Err(e) => log::error!("   ❌ Failed to seed default events: {}", e),
    }
}

fn event(name: &str, category: EventCategory, team: (u32, u32), fee: f64, description: &str) -> Event {
    Event {
        id: None,
        name: name.into(),
        category,
        description: Some(description.into()),
        is_active: true,
        date: None,
        team_size: TeamSize { min: team.0, max: team.1 },
        coordinators: Vec::new(),
        fee,
    }
}

fn build_default_events() -> Vec<Event> {
    vec![
        // Técnicos
        event(
            "Paper Presentation",
            EventCategory::Technical,
            (1, 2),
            150.0,
            "Present original research to a jury panel.",
        ),
        event(
            "Code Debugging",
            EventCategory::Technical,
            (1, 2),
            100.0,
            "Find and fix the bugs before the clock runs out.",
        ),
        event("Hackathon", EventCategory::Technical, (2, 4), 400.0, "Overnight build sprint with mentors."),
        // Não técnicos
        event("Quiz", EventCategory::NonTechnical, (1, 2), 50.0, "General and tech trivia."),
        event("Gaming", EventCategory::NonTechnical, (1, 4), 100.0, "Knockout tournament."),
        // Especiais
        event("Project Expo", EventCategory::Special, (1, 4), 200.0, "Showcase a working prototype."),
        // Workshops
        event("IoT Workshop", EventCategory::Workshop, (1, 1), 300.0, "Hands-on sensors and microcontrollers."),
        event(
            "Machine Learning Workshop",
            EventCategory::Workshop,
            (1, 1),
            300.0,
            "From data cleaning to a deployed model.",
        ),
    ]
}
