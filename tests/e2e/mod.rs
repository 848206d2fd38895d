// End-to-end tests for workout-sync
//
// The token endpoint and the fitness API are played by a wiremock server per
// test; time is a manual clock starting at a fixed instant.
//
// Database tests share one testcontainers PostgreSQL instance. Each test
// receives its own freshly migrated database, so tests run in parallel
// without conflicts. Docker must be available for those.

mod test_workout_sync;
